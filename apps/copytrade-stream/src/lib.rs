#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Copy-Trading Stream - Private Feed Client
//!
//! Maintains one authenticated WebSocket connection to the venue's private
//! feed and multiplexes copy-trading topics over it, delivering each message
//! to the handlers registered for its topic.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `channel`: channel types, endpoint resolution and validation
//!   - `streaming`: connection state and the topic message envelope
//!   - `subscription`: topic-to-handler registry
//!
//! - **Application**: Port definitions
//!   - `ports`: transport connector interface
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `venue`: auth, codec, heartbeat, reconnect, manager, facade
//!   - `config`: environment configuration
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: tracing subscriber and OTLP export
//!
//! # Data Flow
//!
//! ```text
//! copy_trade_order_stream(h)
//!     │  validate endpoint is private
//!     ▼
//! StreamManager::subscribe ──► TopicRegistry
//!     │                             ▲
//!     ▼                             │ lookup
//! run task ◄── venue WS ──► Dispatcher ──► h(&msg)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::channel::{ChannelError, ChannelType, Endpoint, Network};
pub use domain::streaming::{ConnectionState, StreamMessage};
pub use domain::subscription::{Handler, Topic, TopicRegistry};

// Ports
pub use application::ports::{Connector, Frame, FrameSink, FrameStream, TransportError};

// Streams
pub use infrastructure::venue::{
    CopyTradingStream, Credentials, StreamError, StreamManager, StreamManagerConfig, StreamOptions,
    TungsteniteConnector,
};

// Configuration
pub use infrastructure::config::{ConfigError, ConnectionSettings, StreamConfig};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
