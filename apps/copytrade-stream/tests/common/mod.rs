//! In-memory venue for integration tests.
//!
//! `MemoryConnector` hands the client one end of a pair of unbounded
//! channels per connection attempt. The test drives the other end through a
//! `VenueSession`: read what the client sent, push frames back, or drop the
//! session to cut the connection.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use copytrade_stream::{
    ConnectionSettings, Connector, CopyTradingStream, Frame, FrameSink, FrameStream,
    StreamOptions, TransportError,
};

/// How long a test waits for the client to do something.
pub const WAIT: Duration = Duration::from_secs(2);

/// Endpoint override used by tests so nothing resolves to a real host.
pub const TEST_ENDPOINT: &str = "ws://venue.test/realtime_private";

/// Connector that routes every attempt to the test's [`Venue`].
pub struct MemoryConnector {
    attempts: AtomicUsize,
    sessions: mpsc::UnboundedSender<VenueSession>,
}

impl MemoryConnector {
    /// Number of times the client tried to connect.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let (outbound_tx, outbound_rx) = fmpsc::unbounded::<Frame>();
        let (inbound_tx, inbound_rx) = fmpsc::unbounded::<Result<Frame, TransportError>>();

        self.sessions
            .send(VenueSession {
                url: url.to_string(),
                outbound: outbound_rx,
                inbound: inbound_tx,
            })
            .map_err(|_| TransportError::Connect("venue is gone".to_string()))?;

        let sink = outbound_tx.sink_map_err(|e| TransportError::Send(e.to_string()));
        Ok((Box::pin(sink), Box::pin(inbound_rx)))
    }
}

/// Test-side view of the venue.
pub struct Venue {
    sessions: mpsc::UnboundedReceiver<VenueSession>,
}

impl Venue {
    /// Wait for the client's next connection.
    pub async fn accept(&mut self) -> VenueSession {
        tokio::time::timeout(WAIT, self.sessions.recv())
            .await
            .expect("client should connect")
            .expect("connector dropped")
    }

    /// Assert no connection arrives within `quiet`.
    pub async fn assert_no_connection(&mut self, quiet: Duration) {
        if let Ok(Some(session)) = tokio::time::timeout(quiet, self.sessions.recv()).await {
            panic!("unexpected connection to {}", session.url);
        }
    }
}

/// One live connection, seen from the venue.
pub struct VenueSession {
    /// URL the client connected to.
    pub url: String,
    outbound: fmpsc::UnboundedReceiver<Frame>,
    inbound: fmpsc::UnboundedSender<Result<Frame, TransportError>>,
}

impl VenueSession {
    /// Next frame the client sent, or `None` once the client closed its side.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        tokio::time::timeout(WAIT, self.outbound.next())
            .await
            .expect("client should send a frame or close")
    }

    /// Next JSON request, skipping heartbeat pings.
    pub async fn next_request(&mut self) -> Value {
        loop {
            match self.next_frame().await {
                Some(Frame::Text(text)) => {
                    let value: Value = serde_json::from_str(&text).expect("client sent JSON");
                    if value["op"] != "ping" {
                        return value;
                    }
                }
                Some(_) => {}
                None => panic!("client closed the connection"),
            }
        }
    }

    /// Next subscribe request, returning its single topic.
    pub async fn expect_subscribe(&mut self) -> String {
        let request = self.next_request().await;
        assert_eq!(request["op"], "subscribe", "unexpected request {request}");
        let args = request["args"].as_array().expect("subscribe args");
        assert_eq!(args.len(), 1, "one topic per subscribe frame");
        args[0].as_str().expect("topic string").to_string()
    }

    /// Assert the client sends no request (pings aside) within `quiet`.
    pub async fn assert_silent(&mut self, quiet: Duration) {
        let deadline = tokio::time::Instant::now() + quiet;
        loop {
            match tokio::time::timeout_at(deadline, self.outbound.next()).await {
                Err(_) | Ok(None) => return,
                Ok(Some(Frame::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(value["op"], "ping", "unexpected request {value}");
                }
                Ok(Some(_)) => {}
            }
        }
    }

    /// Read the auth request and accept it. Returns the request.
    pub async fn authenticate(&mut self) -> Value {
        let request = self.next_request().await;
        assert_eq!(request["op"], "auth", "expected auth first, got {request}");
        self.push(json!({
            "success": true,
            "ret_msg": "",
            "op": "auth",
            "conn_id": "test-conn"
        }));
        request
    }

    /// Read the auth request and reject it.
    pub async fn reject_auth(&mut self, reason: &str) {
        let request = self.next_request().await;
        assert_eq!(request["op"], "auth", "expected auth first, got {request}");
        self.push(json!({
            "success": false,
            "ret_msg": reason,
            "op": "auth",
            "conn_id": "test-conn"
        }));
    }

    /// Send a JSON envelope to the client.
    pub fn push(&self, value: Value) {
        self.push_frame(Frame::Text(value.to_string()));
    }

    /// Send a raw text frame to the client.
    pub fn push_raw(&self, text: &str) {
        self.push_frame(Frame::text(text));
    }

    /// Send any frame to the client.
    pub fn push_frame(&self, frame: Frame) {
        let _ = self.inbound.unbounded_send(Ok(frame));
    }

    /// Send a topic message to the client.
    pub fn push_topic(&self, topic: &str, data: Value) {
        self.push(json!({
            "topic": topic,
            "id": format!("{topic}-msg"),
            "creationTime": 1_672_364_262_474_i64,
            "data": data
        }));
    }

    /// Cut the connection from the venue side.
    pub fn disconnect(self) {
        drop(self);
    }
}

/// Build a connector wired to a fresh venue.
pub fn venue() -> (Arc<MemoryConnector>, Venue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = Arc::new(MemoryConnector {
        attempts: AtomicUsize::new(0),
        sessions: tx,
    });
    (connector, Venue { sessions: rx })
}

/// Settings with short backoff and a heartbeat that stays out of the way.
pub fn fast_settings() -> ConnectionSettings {
    ConnectionSettings {
        ping_interval: Duration::from_secs(60),
        pong_timeout: Duration::from_secs(60),
        connect_timeout: Duration::from_secs(1),
        auth_timeout: Duration::from_secs(2),
        reconnect_delay_initial: Duration::from_millis(10),
        reconnect_delay_max: Duration::from_millis(50),
        ..ConnectionSettings::default()
    }
}

/// Options with test credentials, fast settings and the test endpoint.
pub fn options() -> StreamOptions {
    StreamOptions {
        endpoint_override: Some(TEST_ENDPOINT.to_string()),
        settings: fast_settings(),
        ..StreamOptions::with_credentials("K", "S")
    }
}

/// A copy-trading stream over a fresh in-memory venue.
pub fn stream_with(options: StreamOptions) -> (CopyTradingStream, Arc<MemoryConnector>, Venue) {
    let (connector, venue) = venue();
    let stream = CopyTradingStream::with_connector("private", options, connector.clone())
        .expect("stream should build");
    (stream, connector, venue)
}

/// Handler that forwards every message's `(topic, data)` to a channel.
pub fn recorder() -> (
    impl Fn(&copytrade_stream::StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    mpsc::UnboundedReceiver<(String, Value)>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |msg: &copytrade_stream::StreamMessage| {
        tx.send((msg.topic.clone(), msg.data.clone()))?;
        Ok(())
    };
    (handler, rx)
}

/// Receive the next recorded message.
pub async fn recv(rx: &mut mpsc::UnboundedReceiver<(String, Value)>) -> (String, Value) {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("handler should be called")
        .expect("recorder dropped")
}

/// Assert nothing is recorded within `quiet`.
pub async fn assert_nothing(rx: &mut mpsc::UnboundedReceiver<(String, Value)>, quiet: Duration) {
    if let Ok(Some(msg)) = tokio::time::timeout(quiet, rx.recv()).await {
        panic!("unexpected delivery {msg:?}");
    }
}

/// Wait until the stream reaches `Ready`.
pub async fn wait_ready(stream: &CopyTradingStream) {
    let mut changes = stream.manager().state_changes();
    tokio::time::timeout(WAIT, changes.wait_for(|s| s.is_ready()))
        .await
        .expect("stream should become ready")
        .expect("state channel closed");
}

/// Wait until the stream reaches `Closed`.
pub async fn wait_closed(stream: &CopyTradingStream) {
    let mut changes = stream.manager().state_changes();
    tokio::time::timeout(WAIT, changes.wait_for(|s| s.is_closed()))
        .await
        .expect("stream should close")
        .expect("state channel closed");
}
