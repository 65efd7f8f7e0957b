//! Channel Types and Endpoint Validation
//!
//! A channel type selects which feed a connection talks to and whether the
//! connection must authenticate. The endpoint URL is resolved once from the
//! channel type and never changes afterwards.
//!
//! Both validators here run before any network I/O, so a misconfigured
//! caller is rejected without a single frame reaching the wire.

use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Suffix every private endpoint URL carries.
pub const PRIVATE_SUFFIX: &str = "private";

/// Default venue domain substituted into endpoint templates.
pub const DEFAULT_DOMAIN: &str = "bybit";

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by channel validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Requested channel type is not in the supported set.
    #[error("channel type '{requested}' is not correct. Available: [{available}]")]
    InvalidChannelType {
        /// The channel type that was requested.
        requested: String,
        /// Comma-separated list of supported channel types.
        available: String,
    },

    /// Active endpoint does not serve the channel a subscription requires.
    #[error("requested topic does not match channel type: {url} does not end with '{required}'")]
    TopicMismatch {
        /// Endpoint URL of the active connection.
        url: String,
        /// Suffix the endpoint must carry.
        required: String,
    },
}

// =============================================================================
// Channel Type
// =============================================================================

/// Broad category of feed a connection is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// Authenticated account feed.
    Private,
}

impl ChannelType {
    /// Wire name of the channel type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
        }
    }

    /// Whether connections on this channel must authenticate.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        matches!(self, Self::Private)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `requested` against the channel types a product supports.
///
/// Matching is exact, the same way the venue spells channel names.
///
/// # Errors
///
/// Returns [`ChannelError::InvalidChannelType`] listing `available` when
/// `requested` is not one of them.
pub fn validate(requested: &str, available: &[ChannelType]) -> Result<ChannelType, ChannelError> {
    available
        .iter()
        .copied()
        .find(|channel| channel.as_str() == requested)
        .ok_or_else(|| ChannelError::InvalidChannelType {
            requested: requested.to_string(),
            available: available
                .iter()
                .map(ChannelType::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Check that `endpoint` serves the channel a subscription helper needs.
///
/// # Errors
///
/// Returns [`ChannelError::TopicMismatch`] when the endpoint URL does not
/// end with `required_suffix`.
pub fn validate_topic_match(endpoint: &Endpoint, required_suffix: &str) -> Result<(), ChannelError> {
    if endpoint.url().ends_with(required_suffix) {
        Ok(())
    } else {
        Err(ChannelError::TopicMismatch {
            url: endpoint.url().to_string(),
            required: required_suffix.to_string(),
        })
    }
}

// =============================================================================
// Network
// =============================================================================

/// Venue environment an endpoint points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// Production.
    #[default]
    Mainnet,
    /// Public testnet.
    Testnet,
    /// Demo trading on production infrastructure.
    Demo,
}

impl Network {
    /// Parse a network name, ignoring case.
    ///
    /// Returns `None` for unrecognized names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "live" => Some(Self::Mainnet),
            "testnet" => Some(Self::Testnet),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }

    /// Stream subdomain for this network.
    #[must_use]
    pub const fn subdomain(&self) -> &'static str {
        match self {
            Self::Mainnet => "stream",
            Self::Testnet => "stream-testnet",
            Self::Demo => "stream-demo",
        }
    }

    /// Network name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Demo => "demo",
        }
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Resolved WebSocket URL for one connection.
///
/// Created once at construction. There is no setter: one endpoint per
/// connection for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    channel: ChannelType,
    url: String,
}

impl Endpoint {
    /// Create an endpoint with an explicit URL.
    #[must_use]
    pub fn new(channel: ChannelType, url: impl Into<String>) -> Self {
        Self {
            channel,
            url: url.into(),
        }
    }

    /// Resolve a URL template containing `{SUBDOMAIN}` and `{DOMAIN}`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use copytrade_stream::domain::channel::{ChannelType, Endpoint, Network};
    ///
    /// let endpoint = Endpoint::from_template(
    ///     ChannelType::Private,
    ///     "wss://{SUBDOMAIN}.{DOMAIN}.com/realtime_private",
    ///     Network::Testnet,
    ///     "bybit",
    /// );
    /// assert_eq!(endpoint.url(), "wss://stream-testnet.bybit.com/realtime_private");
    /// ```
    #[must_use]
    pub fn from_template(
        channel: ChannelType,
        template: &str,
        network: Network,
        domain: &str,
    ) -> Self {
        let url = template
            .replace("{SUBDOMAIN}", network.subdomain())
            .replace("{DOMAIN}", domain);
        Self { channel, url }
    }

    /// Channel type this endpoint was resolved for.
    #[must_use]
    pub const fn channel(&self) -> ChannelType {
        self.channel
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
