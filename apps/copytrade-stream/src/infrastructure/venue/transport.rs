//! WebSocket Transport
//!
//! `Connector` adapter over `tokio-tungstenite`. Splits the socket into a
//! frame sink and a frame stream so the connection task owns the only
//! writer.

use async_trait::async_trait;
use futures::future::ready;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::application::ports::{Connector, Frame, FrameSink, FrameStream, TransportError};

/// Opens TLS WebSocket connections with `connect_async`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    /// Create a new connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|frame: Frame| ready(Ok::<_, TransportError>(to_message(frame))));

        let stream = read.filter_map(|item| ready(from_message(item)));

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(
    item: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Frame, TransportError>> {
    match item {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Some(Ok(Frame::Text(text))),
            Err(_) => {
                tracing::warn!(len = data.len(), "Received non-UTF8 binary message");
                None
            }
        },
        Ok(Message::Ping(data)) => Some(Ok(Frame::Ping(data.to_vec()))),
        Ok(Message::Pong(data)) => Some(Ok(Frame::Pong(data.to_vec()))),
        Ok(Message::Close(frame)) => {
            if let Some(frame) = frame {
                tracing::info!(
                    code = u16::from(frame.code),
                    reason = frame.reason.as_str(),
                    "Server sent close frame"
                );
            }
            Some(Ok(Frame::Close))
        }
        Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
    }
}
