//! Venue WebSocket Message Types
//!
//! Wire format types for the venue's private stream.
//!
//! # Outbound
//! - `auth`: `{"op":"auth","args":[key, expires, signature]}`
//! - `subscribe`: `{"op":"subscribe","req_id":"...","args":["copyTradeOrder"]}`
//! - `ping`: `{"op":"ping","req_id":"..."}`
//!
//! # Inbound
//! - Topic envelopes carry a `topic` field and are decoded into
//!   [`StreamMessage`](crate::domain::streaming::StreamMessage).
//! - Control envelopes carry an `op` field plus `success`/`ret_msg`.

use serde::{Deserialize, Serialize};

// =============================================================================
// Outbound
// =============================================================================

/// Operation named in a request envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Authenticate the connection.
    Auth,
    /// Subscribe to topics.
    Subscribe,
    /// Application-level heartbeat.
    Ping,
}

/// Request envelope sent to the venue.
///
/// # Wire Format (JSON)
/// ```json
/// {"req_id": "b4c6…", "op": "subscribe", "args": ["copyTradeOrder"]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpRequest {
    /// Correlation id echoed back in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,

    /// Requested operation.
    pub op: Op,

    /// Operation arguments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,
}

impl OpRequest {
    /// Create an authentication request.
    #[must_use]
    pub fn auth(api_key: &str, expires: i64, signature: String) -> Self {
        Self {
            req_id: None,
            op: Op::Auth,
            args: vec![
                serde_json::Value::from(api_key),
                serde_json::Value::from(expires),
                serde_json::Value::from(signature),
            ],
        }
    }

    /// Create a subscribe request for `topics`.
    #[must_use]
    pub fn subscribe(topics: impl IntoIterator<Item = String>) -> Self {
        Self {
            req_id: Some(uuid::Uuid::new_v4().to_string()),
            op: Op::Subscribe,
            args: topics.into_iter().map(serde_json::Value::from).collect(),
        }
    }

    /// Create a heartbeat ping.
    #[must_use]
    pub fn ping() -> Self {
        Self {
            req_id: Some(uuid::Uuid::new_v4().to_string()),
            op: Op::Ping,
            args: Vec::new(),
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Response to an `auth`, `subscribe` or `ping` request.
///
/// # Wire Format (JSON)
/// ```json
/// {"success": true, "ret_msg": "", "op": "auth", "conn_id": "cejreaspqfh3sjdnldmg-p"}
/// {"req_id": "", "op": "pong", "args": ["1675418560633"], "conn_id": "cfcb4ocsvfriu23r3er0-1b"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResponse {
    /// Operation this responds to.
    pub op: String,

    /// Outcome. Absent on private pongs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Venue message, typically empty on success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ret_msg: String,

    /// Connection identifier assigned by the venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_id: Option<String>,

    /// Correlation id from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
}

impl OpResponse {
    /// Check if the venue accepted the request.
    ///
    /// Responses without a `success` field (private pongs) count as accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(true)
    }
}

/// Control envelope classified by operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Authentication verdict.
    Auth(OpResponse),
    /// Subscribe acknowledgement.
    Subscribe(OpResponse),
    /// Heartbeat reply.
    Pong(OpResponse),
    /// Any other operation.
    Other(OpResponse),
}

impl From<OpResponse> for ControlMessage {
    fn from(response: OpResponse) -> Self {
        match response.op.as_str() {
            "auth" => Self::Auth(response),
            "subscribe" => Self::Subscribe(response),
            "pong" => Self::Pong(response),
            // Public endpoints answer a ping with op "ping" and ret_msg "pong"
            "ping" if response.ret_msg == "pong" => Self::Pong(response),
            _ => Self::Other(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_wire_format() {
        let req = OpRequest::auth("K", 1_700_000_001_000, "abc".to_string());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"op": "auth", "args": ["K", 1_700_000_001_000_i64, "abc"]})
        );
    }

    #[test]
    fn subscribe_request_has_req_id() {
        let req = OpRequest::subscribe(vec!["copyTradeOrder".to_string()]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "subscribe");
        assert_eq!(json["args"], serde_json::json!(["copyTradeOrder"]));
        assert!(json["req_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[test]
    fn ping_request_omits_args() {
        let json = serde_json::to_value(OpRequest::ping()).unwrap();
        assert_eq!(json["op"], "ping");
        assert!(json.get("args").is_none());
    }

    #[test]
    fn classify_control_messages() {
        let parse = |s: &str| ControlMessage::from(serde_json::from_str::<OpResponse>(s).unwrap());

        assert!(matches!(
            parse(r#"{"success":true,"ret_msg":"","op":"auth","conn_id":"c1"}"#),
            ControlMessage::Auth(r) if r.is_success()
        ));
        assert!(matches!(
            parse(r#"{"success":false,"ret_msg":"error:handler not found","op":"subscribe"}"#),
            ControlMessage::Subscribe(r) if !r.is_success()
        ));
        assert!(matches!(
            parse(r#"{"req_id":"","op":"pong","args":["1675418560633"],"conn_id":"c2"}"#),
            ControlMessage::Pong(_)
        ));
        assert!(matches!(
            parse(r#"{"success":true,"ret_msg":"pong","conn_id":"c3","op":"ping"}"#),
            ControlMessage::Pong(_)
        ));
        assert!(matches!(
            parse(r#"{"op":"unsubscribe","success":true}"#),
            ControlMessage::Other(_)
        ));
    }
}
