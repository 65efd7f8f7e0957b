//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Connector`: opens a full-duplex frame channel to an endpoint URL.
//!   The production adapter speaks WebSocket; tests plug in an in-memory
//!   venue.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

/// A single message on the full-duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload (every venue envelope).
    Text(String),
    /// Protocol-level ping.
    Ping(Vec<u8>),
    /// Protocol-level pong.
    Pong(Vec<u8>),
    /// Peer is closing the channel.
    Close,
}

impl Frame {
    /// Create a text frame.
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self::Text(payload.into())
    }
}

/// Errors raised by transport adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Opening the channel failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The peer closed the channel or the stream ended.
    #[error("connection closed by peer")]
    Closed,
}

/// Write half of a connected channel.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Read half of a connected channel.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Opens transport connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url` and return the write and read halves.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` when the channel cannot be opened.
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}
