//! Streaming Types
//!
//! Connection lifecycle states and the topic message envelope handed to
//! subscription handlers.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of a stream connection.
///
/// ```text
/// Disconnected ─► Connecting ─► Authenticating ─► Ready
///                     ▲                             │
///                     └──────── Reconnecting ◄──────┘
///
/// any state ─► Closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Constructed, no transport opened yet.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Auth frame sent, waiting for the venue's verdict.
    Authenticating,
    /// Authenticated (when required) and subscriptions replayed.
    Ready,
    /// Transport lost, waiting out the backoff delay.
    Reconnecting,
    /// Closed by the caller or after giving up. Terminal.
    Closed,
}

impl ConnectionState {
    /// State name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Numeric code used for the connection state gauge.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Authenticating => 2,
            Self::Ready => 3,
            Self::Reconnecting => 4,
            Self::Closed => 5,
        }
    }

    /// Check if messages can flow.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if the connection is permanently closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stream Message
// =============================================================================

/// Topic message pushed by the venue.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "topic": "copyTradeOrder",
///   "id": "5923240c6880ab-c59f-420b-9adb-3639adc9dd90",
///   "creationTime": 1672364262474,
///   "data": [{"symbol": "BTCUSDT", "side": "Buy"}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Topic the message belongs to.
    pub topic: String,

    /// Message identifier assigned by the venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Venue creation time in milliseconds since the Unix epoch.
    #[serde(
        default,
        rename = "creationTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_time: Option<i64>,

    /// Topic-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl StreamMessage {
    /// Create a message for `topic` carrying `data`.
    #[must_use]
    pub fn new(topic: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            id: None,
            creation_time: None,
            data,
        }
    }

    /// Venue creation time as a UTC timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.creation_time
            .and_then(chrono::DateTime::from_timestamp_millis)
    }
}
