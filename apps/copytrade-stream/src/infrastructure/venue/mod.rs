//! Venue WebSocket Adapters
//!
//! Private stream client for the venue:
//!
//! - **Manager**: connection lifecycle, auth gating, subscription replay
//! - **Dispatcher**: topic-to-handler routing
//! - **Copy trading**: product facade over the manager

pub mod auth;
pub mod codec;
pub mod copy_trading;
pub mod dispatcher;
pub mod heartbeat;
pub mod manager;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use auth::{AuthError, AuthHandler, AuthState, Credentials};
pub use codec::{CodecError, InboundFrame, JsonCodec};
pub use copy_trading::{
    AVAILABLE_CHANNEL_TYPES, CopyTradingStream, PRIVATE_WSS, StreamOptions, TOPIC_EXECUTION,
    TOPIC_ORDER, TOPIC_POSITION, TOPIC_WALLET, WSS_NAME,
};
pub use dispatcher::{DispatchOutcome, Dispatcher, Inbound};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
pub use manager::{StreamError, StreamManager, StreamManagerConfig};
pub use messages::{ControlMessage, Op, OpRequest, OpResponse};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use transport::TungsteniteConnector;
