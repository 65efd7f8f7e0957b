//! Heartbeat Manager
//!
//! Keeps the private connection alive with periodic `{"op":"ping"}` frames
//! and detects a dead transport when a ping goes unanswered.
//!
//! Any inbound frame counts as liveness, not only pongs. The manager task
//! only emits events; the connection task owns the sink and writes the
//! actual ping frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::config::ConnectionSettings;

/// Ping cadence and dead-peer threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between `op: ping` requests.
    pub ping_interval: Duration,
    /// Time without inbound traffic after a ping before the connection is
    /// considered dead.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl HeartbeatConfig {
    /// Build from explicit durations.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }

    /// Create configuration from `ConnectionSettings`.
    #[must_use]
    pub const fn from_connection_settings(settings: &ConnectionSettings) -> Self {
        Self {
            ping_interval: settings.ping_interval,
            pong_timeout: settings.pong_timeout,
        }
    }

    /// How often the manager wakes to check for pings and timeouts.
    fn check_interval(&self) -> Duration {
        self.ping_interval
            .min(self.pong_timeout)
            .max(Duration::from_millis(1))
    }
}

/// What the heartbeat task asks the connection task to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Write a ping request now.
    SendPing,
    /// A ping went unanswered for longer than the pong timeout.
    Timeout,
}

#[derive(Debug)]
struct Inner {
    last_activity: Instant,
    ping_sent_at: Option<Instant>,
}

/// Liveness state shared between the heartbeat manager and the connection task.
#[derive(Debug)]
pub struct HeartbeatState {
    inner: Mutex<Inner>,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Fresh state: activity now, no ping outstanding.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_activity: Instant::now(),
                ping_sent_at: None,
            }),
        }
    }

    /// Record inbound traffic of any kind.
    pub fn record_activity(&self) {
        let mut inner = self.inner.lock();
        inner.last_activity = Instant::now();
        inner.ping_sent_at = None;
    }

    /// Record that a ping was written.
    ///
    /// An earlier unanswered ping keeps its timestamp.
    pub fn mark_ping_sent(&self) {
        let mut inner = self.inner.lock();
        if inner.ping_sent_at.is_none() {
            inner.ping_sent_at = Some(Instant::now());
        }
    }

    /// Check if a ping is outstanding.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.inner.lock().ping_sent_at.is_some()
    }

    /// Time since the oldest unanswered ping, if any.
    #[must_use]
    pub fn unanswered_for(&self) -> Option<Duration> {
        self.inner.lock().ping_sent_at.map(|sent| sent.elapsed())
    }

    /// Time since the last inbound frame.
    #[must_use]
    pub fn time_since_activity(&self) -> Duration {
        self.inner.lock().last_activity.elapsed()
    }
}

/// Per-connection heartbeat task.
///
/// Spawned once per connection with a child token of the stream's
/// cancellation token, so it dies with the connection.
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use copytrade_stream::infrastructure::venue::heartbeat::{
///     HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState,
/// };
///
/// # async fn example(cancel: tokio_util::sync::CancellationToken) {
/// let liveness = Arc::new(HeartbeatState::new());
/// let (tx, mut events) = tokio::sync::mpsc::channel(4);
/// let heartbeat = HeartbeatManager::new(HeartbeatConfig::default(), liveness.clone(), tx, cancel);
/// tokio::spawn(heartbeat.run());
///
/// while let Some(HeartbeatEvent::SendPing) = events.recv().await {
///     // write {"op":"ping"} here
///     liveness.mark_ping_sent();
/// }
/// # }
/// ```
pub struct HeartbeatManager {
    config: HeartbeatConfig,
    liveness: Arc<HeartbeatState>,
    events: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
}

impl HeartbeatManager {
    /// Wire a heartbeat task to `liveness` and the `events` channel.
    #[must_use]
    pub const fn new(
        config: HeartbeatConfig,
        liveness: Arc<HeartbeatState>,
        events: mpsc::Sender<HeartbeatEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            liveness,
            events,
            cancel,
        }
    }

    /// Run the heartbeat loop until cancelled or a timeout is detected.
    ///
    /// The first ping is due one `ping_interval` after start.
    pub async fn run(self) {
        let period = self.config.check_interval();
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_ping = Instant::now();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticks.tick() => {
                    if self.check_and_ping(&mut last_ping).await.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::trace!("Heartbeat stopped");
    }

    /// Check for a timeout and request a ping when one is due.
    ///
    /// Returns `Err(())` if the loop should exit.
    async fn check_and_ping(&self, last_ping: &mut Instant) -> Result<(), ()> {
        let overdue = self
            .liveness
            .unanswered_for()
            .filter(|elapsed| *elapsed > self.config.pong_timeout);

        if let Some(elapsed) = overdue {
            tracing::warn!(
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                timeout_ms = u64::try_from(self.config.pong_timeout.as_millis()).unwrap_or(u64::MAX),
                "Ping unanswered, connection presumed dead"
            );
            let _ = self.events.send(HeartbeatEvent::Timeout).await;
            return Err(());
        }

        if last_ping.elapsed() < self.config.ping_interval {
            return Ok(());
        }

        if self.events.send(HeartbeatEvent::SendPing).await.is_err() {
            // Connection task is gone.
            return Err(());
        }
        *last_ping = Instant::now();

        Ok(())
    }
}
