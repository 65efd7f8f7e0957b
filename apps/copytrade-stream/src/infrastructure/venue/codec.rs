//! Stream Codec
//!
//! Decodes venue text frames into either a topic message for the dispatcher
//! or a control envelope for the connection manager.
//!
//! Envelopes are JSON objects. A `topic` field marks a data push, an `op`
//! field marks a control response. Anything else is malformed.

use serde::Serialize;

use super::messages::{ControlMessage, OpResponse};
use crate::domain::streaming::StreamMessage;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Object has neither a `topic` nor an `op` field.
    #[error("unknown frame: {0}")]
    UnknownFrame(String),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Data push for a topic.
    Topic(StreamMessage),
    /// Response to a request sent on this connection.
    Control(ControlMessage),
}

/// JSON codec for the private stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON, not an object, or carries
    /// neither a `topic` nor an `op` field.
    pub fn decode(&self, text: &str) -> Result<InboundFrame, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                preview(trimmed)
            )));
        }

        let value: serde_json::Value = serde_json::from_str(trimmed)?;

        if value.get("topic").is_some_and(serde_json::Value::is_string) {
            let message: StreamMessage = serde_json::from_value(value)?;
            return Ok(InboundFrame::Topic(message));
        }

        if value.get("op").is_some_and(serde_json::Value::is_string) {
            let response: OpResponse = serde_json::from_value(value)?;
            return Ok(InboundFrame::Control(response.into()));
        }

        Err(CodecError::UnknownFrame(preview(trimmed).to_string()))
    }

    /// Encode a value as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(50) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::venue::messages::OpRequest;

    #[test]
    fn decode_topic_message() {
        let codec = JsonCodec::new();
        let frame = codec
            .decode(
                r#"{"topic":"copyTradeExecution","id":"e1","creationTime":1672364174455,"data":[{"execQty":"0.01"}]}"#,
            )
            .unwrap();

        match frame {
            InboundFrame::Topic(msg) => {
                assert_eq!(msg.topic, "copyTradeExecution");
                assert_eq!(msg.data[0]["execQty"], "0.01");
            }
            InboundFrame::Control(other) => panic!("expected topic, got {other:?}"),
        }
    }

    #[test]
    fn decode_auth_response() {
        let frame = JsonCodec::new()
            .decode(r#"{"success":true,"ret_msg":"","op":"auth","conn_id":"c1"}"#)
            .unwrap();
        assert!(matches!(
            frame,
            InboundFrame::Control(ControlMessage::Auth(r)) if r.is_success()
        ));
    }

    #[test]
    fn decode_pong() {
        let frame = JsonCodec::new()
            .decode(r#"{"req_id":"r","op":"pong","args":["1675418560633"],"conn_id":"c2"}"#)
            .unwrap();
        assert!(matches!(frame, InboundFrame::Control(ControlMessage::Pong(_))));
    }

    #[test]
    fn decode_rejects_non_json() {
        let err = JsonCodec::new().decode("not json").unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }

    #[test]
    fn decode_rejects_truncated_json() {
        let err = JsonCodec::new().decode(r#"{"topic":"copyTr"#).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn decode_rejects_unknown_object() {
        let err = JsonCodec::new().decode(r#"{"hello":"world"}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnknownFrame(_)));
    }

    #[test]
    fn encode_request() {
        let encoded = JsonCodec::new().encode(&OpRequest::ping()).unwrap();
        assert!(encoded.contains(r#""op":"ping""#));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "é".repeat(80);
        assert_eq!(preview(&text).chars().count(), 50);
    }
}
