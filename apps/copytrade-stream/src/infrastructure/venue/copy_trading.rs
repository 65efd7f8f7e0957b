//! Copy-Trading Private Streams
//!
//! Thin facade over [`StreamManager`] exposing the copy-trading topics.
//!
//! # Stream URL
//!
//! - Mainnet: `wss://stream.bybit.com/realtime_private`
//! - Testnet: `wss://stream-testnet.bybit.com/realtime_private`
//! - Demo: `wss://stream-demo.bybit.com/realtime_private`
//!
//! # Topics
//!
//! | Method                            | Topic                |
//! |-----------------------------------|----------------------|
//! | `copy_trade_position_stream`      | `copyTradePosition`  |
//! | `copy_trade_order_stream`         | `copyTradeOrder`     |
//! | `copy_trade_execution_stream`     | `copyTradeExecution` |
//! | `copy_trade_wallet_stream`        | `copyTradeWallet`    |

use std::sync::Arc;

use super::auth::Credentials;
use super::manager::{StreamError, StreamManager, StreamManagerConfig};
use super::transport::TungsteniteConnector;
use crate::application::ports::Connector;
use crate::domain::channel::{
    self, ChannelType, DEFAULT_DOMAIN, Endpoint, Network, PRIVATE_SUFFIX,
};
use crate::domain::streaming::{ConnectionState, StreamMessage};
use crate::infrastructure::config::{ConnectionSettings, StreamConfig};

// =============================================================================
// Constants
// =============================================================================

/// Stream name used in logs and metric labels.
pub const WSS_NAME: &str = "copytrading";

/// Private endpoint template.
pub const PRIVATE_WSS: &str = "wss://{SUBDOMAIN}.{DOMAIN}.com/realtime_private";

/// Channel types the copy-trading product offers.
pub const AVAILABLE_CHANNEL_TYPES: &[ChannelType] = &[ChannelType::Private];

/// Copy-trading position updates.
pub const TOPIC_POSITION: &str = "copyTradePosition";

/// Copy-trading order updates.
pub const TOPIC_ORDER: &str = "copyTradeOrder";

/// Copy-trading executions.
pub const TOPIC_EXECUTION: &str = "copyTradeExecution";

/// Copy-trading wallet updates.
pub const TOPIC_WALLET: &str = "copyTradeWallet";

// =============================================================================
// Options
// =============================================================================

/// Construction options for [`CopyTradingStream`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// API key.
    pub api_key: Option<String>,
    /// API secret.
    pub api_secret: Option<String>,
    /// Venue environment.
    pub network: Network,
    /// Venue domain.
    pub domain: String,
    /// URL used instead of the resolved endpoint.
    pub endpoint_override: Option<String>,
    /// Connection lifecycle settings.
    pub settings: ConnectionSettings,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            network: Network::default(),
            domain: DEFAULT_DOMAIN.to_string(),
            endpoint_override: None,
            settings: ConnectionSettings::default(),
        }
    }
}

impl StreamOptions {
    /// Options carrying `api_key` and `api_secret`.
    #[must_use]
    pub fn with_credentials(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_secret: Some(api_secret.into()),
            ..Self::default()
        }
    }
}

impl From<&StreamConfig> for StreamOptions {
    fn from(config: &StreamConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            network: config.network,
            domain: config.domain.clone(),
            endpoint_override: config.endpoint_override.clone(),
            settings: config.connection.clone(),
        }
    }
}

// =============================================================================
// Copy-Trading Stream
// =============================================================================

/// Copy-trading private stream client.
///
/// Dropping the client closes its connection.
///
/// # Example
///
/// ```rust,no_run
/// use copytrade_stream::{CopyTradingStream, StreamOptions};
///
/// # async fn example() -> Result<(), copytrade_stream::StreamError> {
/// let stream = CopyTradingStream::new("private", StreamOptions::with_credentials("K", "S"))?;
///
/// stream.copy_trade_order_stream(|msg| {
///     println!("{}: {}", msg.topic, msg.data);
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CopyTradingStream {
    manager: StreamManager,
}

impl CopyTradingStream {
    /// Create a client that connects over TLS WebSocket.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChannelType` for an unsupported channel type and
    /// `Unauthorized` when credentials are missing or incomplete.
    pub fn new(channel_type: &str, options: StreamOptions) -> Result<Self, StreamError> {
        Self::with_connector(channel_type, options, Arc::new(TungsteniteConnector::new()))
    }

    /// Create a client over a custom transport.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_connector(
        channel_type: &str,
        options: StreamOptions,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, StreamError> {
        let channel = channel::validate(channel_type, AVAILABLE_CHANNEL_TYPES)?;
        let credentials = Credentials::resolve(options.api_key, options.api_secret, channel)?;

        let endpoint = match options.endpoint_override {
            Some(url) => Endpoint::new(channel, url),
            None => Endpoint::from_template(channel, PRIVATE_WSS, options.network, &options.domain),
        };

        tracing::debug!(
            stream = WSS_NAME,
            channel = %channel,
            endpoint = %endpoint,
            network = options.network.as_str(),
            "Copy-trading stream created"
        );

        let manager = StreamManager::new(
            StreamManagerConfig {
                name: WSS_NAME.to_string(),
                endpoint,
                credentials,
                settings: options.settings,
            },
            connector,
        )?;

        Ok(Self { manager })
    }

    /// Subscribe to copy-trading position updates.
    ///
    /// # Errors
    ///
    /// Returns `TopicMismatch` when the endpoint is not private, and the
    /// [`StreamManager::subscribe`] errors otherwise.
    pub fn copy_trade_position_stream<F>(&self, callback: F) -> Result<(), StreamError>
    where
        F: Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_topic_match()?;
        self.manager.subscribe(TOPIC_POSITION, callback)
    }

    /// Subscribe to copy-trading order updates.
    ///
    /// # Errors
    ///
    /// Returns `TopicMismatch` when the endpoint is not private, and the
    /// [`StreamManager::subscribe`] errors otherwise.
    pub fn copy_trade_order_stream<F>(&self, callback: F) -> Result<(), StreamError>
    where
        F: Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_topic_match()?;
        self.manager.subscribe(TOPIC_ORDER, callback)
    }

    /// Subscribe to copy-trading executions.
    ///
    /// # Errors
    ///
    /// Returns `TopicMismatch` when the endpoint is not private, and the
    /// [`StreamManager::subscribe`] errors otherwise.
    pub fn copy_trade_execution_stream<F>(&self, callback: F) -> Result<(), StreamError>
    where
        F: Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_topic_match()?;
        self.manager.subscribe(TOPIC_EXECUTION, callback)
    }

    /// Subscribe to copy-trading wallet updates.
    ///
    /// # Errors
    ///
    /// Returns `TopicMismatch` when the endpoint is not private, and the
    /// [`StreamManager::subscribe`] errors otherwise.
    pub fn copy_trade_wallet_stream<F>(&self, callback: F) -> Result<(), StreamError>
    where
        F: Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_topic_match()?;
        self.manager.subscribe(TOPIC_WALLET, callback)
    }

    fn validate_topic_match(&self) -> Result<(), StreamError> {
        Ok(channel::validate_topic_match(
            self.manager.endpoint(),
            PRIVATE_SUFFIX,
        )?)
    }

    /// Underlying connection manager.
    #[must_use]
    pub const fn manager(&self) -> &StreamManager {
        &self.manager
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Check if the connection is ready.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Endpoint this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        self.manager.endpoint()
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.manager.close();
    }
}

impl Drop for CopyTradingStream {
    fn drop(&mut self) {
        self.manager.close();
    }
}
