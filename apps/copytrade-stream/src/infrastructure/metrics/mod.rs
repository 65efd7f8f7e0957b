//! Prometheus Metrics Module
//!
//! Exposes stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: inbound frames, malformed frames
//! - **Dispatch**: messages delivered, messages with no handler, handler failures
//! - **Connection**: state gauge, reconnects, auth failures
//! - **Subscriptions**: distinct subscribed topics
//!
//! Recording functions are no-ops until a recorder is installed, so library
//! users and tests never need to call [`init_metrics`].

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::streaming::ConnectionState;

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// A port of 0 disables the exporter. Repeated calls after a successful
/// install are no-ops and return the address already bound.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<Option<SocketAddr>, BuildError> {
    if port == 0 {
        return Ok(None);
    }
    if let Some(addr) = INSTALLED.get() {
        return Ok(Some(*addr));
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    Ok(Some(*INSTALLED.get_or_init(|| addr)))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "copytrade_stream_frames_received_total",
        "Total text frames received from the venue"
    );
    describe_counter!(
        "copytrade_stream_malformed_frames_total",
        "Total inbound frames dropped because they could not be decoded"
    );
    describe_counter!(
        "copytrade_stream_messages_dispatched_total",
        "Total topic messages delivered to at least one handler"
    );
    describe_counter!(
        "copytrade_stream_messages_unrouted_total",
        "Total topic messages dropped because no handler was registered"
    );
    describe_counter!(
        "copytrade_stream_handler_failures_total",
        "Total handler invocations that returned an error or panicked"
    );
    describe_counter!(
        "copytrade_stream_reconnects_total",
        "Total reconnection attempts"
    );
    describe_counter!(
        "copytrade_stream_auth_failures_total",
        "Total rejected or timed out authentication attempts"
    );
    describe_gauge!(
        "copytrade_stream_connection_state",
        "Connection state code (0 disconnected, 1 connecting, 2 authenticating, 3 ready, 4 reconnecting, 5 closed)"
    );
    describe_gauge!(
        "copytrade_stream_subscribed_topics",
        "Number of distinct subscribed topics"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a text frame received from the venue.
pub fn record_frame_received(stream: &str) {
    counter!("copytrade_stream_frames_received_total", "stream" => stream.to_string()).increment(1);
}

/// Record a frame that failed to decode.
pub fn record_malformed_frame(stream: &str) {
    counter!("copytrade_stream_malformed_frames_total", "stream" => stream.to_string())
        .increment(1);
}

/// Record a topic message delivered to handlers.
pub fn record_message_dispatched(topic: &str) {
    counter!("copytrade_stream_messages_dispatched_total", "topic" => topic.to_string())
        .increment(1);
}

/// Record a topic message with no registered handler.
///
/// Labelled by stream: the topic came from the venue and is unbounded.
pub fn record_message_unrouted(stream: &str) {
    counter!("copytrade_stream_messages_unrouted_total", "stream" => stream.to_string())
        .increment(1);
}

/// Record a failed handler invocation.
pub fn record_handler_failure(topic: &str) {
    counter!("copytrade_stream_handler_failures_total", "topic" => topic.to_string())
        .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect(stream: &str) {
    counter!("copytrade_stream_reconnects_total", "stream" => stream.to_string()).increment(1);
}

/// Record a failed authentication attempt.
pub fn record_auth_failure(stream: &str) {
    counter!("copytrade_stream_auth_failures_total", "stream" => stream.to_string()).increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(stream: &str, state: ConnectionState) {
    gauge!("copytrade_stream_connection_state", "stream" => stream.to_string())
        .set(f64::from(state.code()));
}

/// Update the subscribed topic gauge.
pub fn set_subscribed_topics(stream: &str, count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("copytrade_stream_subscribed_topics", "stream" => stream.to_string())
        .set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
