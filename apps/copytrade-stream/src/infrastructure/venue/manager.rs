//! Stream Connection Manager
//!
//! Owns one private stream connection: connect, authenticate, replay
//! subscriptions, dispatch inbound messages and reconnect on failure.
//!
//! # Lifecycle
//!
//! ```text
//! subscribe()/connect() ─► spawn run task
//!
//! run task:
//!   loop {
//!     Connecting ─► Authenticating ─► Ready (replay topics) ─► receive loop
//!        │                                                      │
//!        └──── Reconnecting (backoff) ◄──── transport/auth error ┘
//!   }
//!   ─► Closed
//! ```
//!
//! The run task is the only writer to the sink. Callers never block on it:
//! `subscribe` records the topic in the registry and enqueues a command.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::auth::{AuthError, AuthHandler, Credentials};
use super::codec::{CodecError, JsonCodec};
use super::dispatcher::{Dispatcher, Inbound};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState};
use super::messages::{ControlMessage, OpRequest};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{Connector, Frame, FrameSink, TransportError};
use crate::domain::channel::{ChannelError, Endpoint};
use crate::domain::streaming::{ConnectionState, StreamMessage};
use crate::domain::subscription::{Topic, TopicRegistry, handler};
use crate::infrastructure::config::ConnectionSettings;
use crate::infrastructure::metrics;

/// Time allowed for a close frame to flush on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned to callers of the stream API.
///
/// Only pre-flight problems surface here. Failures on an established
/// connection are handled by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Requested channel type is not supported.
    #[error("channel type '{requested}' is not correct. Available: [{available}]")]
    InvalidChannelType {
        /// The channel type that was requested.
        requested: String,
        /// Comma-separated list of supported channel types.
        available: String,
    },

    /// Endpoint does not serve the channel the subscription requires.
    #[error("requested topic does not match channel type: {url} does not end with '{required}'")]
    TopicMismatch {
        /// Endpoint URL of the active connection.
        url: String,
        /// Suffix the endpoint must carry.
        required: String,
    },

    /// Credentials are missing or incomplete.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The stream has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection task must start but no tokio runtime is running.
    #[error("no tokio runtime available to run the connection")]
    NoRuntime,
}

impl From<ChannelError> for StreamError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::InvalidChannelType {
                requested,
                available,
            } => Self::InvalidChannelType {
                requested,
                available,
            },
            ChannelError::TopicMismatch { url, required } => Self::TopicMismatch { url, required },
        }
    }
}

impl From<AuthError> for StreamError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized(reason) => Self::Unauthorized(reason),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

/// Why one connection attempt ended.
#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("heartbeat timeout: no traffic after ping")]
    HeartbeatTimeout,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`StreamManager`].
#[derive(Debug, Clone)]
pub struct StreamManagerConfig {
    /// Stream name used in logs and metric labels.
    pub name: String,
    /// Endpoint the connection is opened against.
    pub endpoint: Endpoint,
    /// Credentials, required when the endpoint's channel authenticates.
    pub credentials: Option<Credentials>,
    /// Connection lifecycle settings.
    pub settings: ConnectionSettings,
}

// =============================================================================
// Stream Manager
// =============================================================================

enum Command {
    Subscribe(Topic),
}

struct Shared {
    config: StreamManagerConfig,
    registry: Arc<TopicRegistry>,
    dispatcher: Dispatcher,
    codec: JsonCodec,
    connector: Arc<dyn Connector>,
    state_tx: watch::Sender<ConnectionState>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    cancel: CancellationToken,
}

/// State owned by caller handles only, never by the run task.
///
/// When the last handle goes away the command channel closes and the guard
/// cancels the run task.
struct Handles {
    commands: mpsc::UnboundedSender<Command>,
    _close_on_drop: DropGuard,
}

/// Handle to one managed stream connection.
///
/// Cloning yields another handle to the same connection. Dropping every
/// handle closes the connection.
#[derive(Clone)]
pub struct StreamManager {
    shared: Arc<Shared>,
    handles: Arc<Handles>,
}

impl StreamManager {
    /// Create a manager. No I/O happens until the first subscribe or
    /// [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Unauthorized` when the endpoint's channel
    /// requires authentication and no credentials were supplied.
    pub fn new(
        config: StreamManagerConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, StreamError> {
        let channel = config.endpoint.channel();
        if channel.requires_auth() && config.credentials.is_none() {
            return Err(StreamError::Unauthorized(format!(
                "API key and secret are required for the {channel} channel"
            )));
        }

        let registry = Arc::new(TopicRegistry::new());
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        Ok(Self {
            shared: Arc::new(Shared {
                dispatcher: Dispatcher::new(config.name.clone(), Arc::clone(&registry)),
                registry,
                codec: JsonCodec::new(),
                connector,
                state_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: cancel.clone(),
                config,
            }),
            handles: Arc::new(Handles {
                commands: command_tx,
                _close_on_drop: cancel.drop_guard(),
            }),
        })
    }

    /// Start the connection task if it is not running yet.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` after [`close`](Self::close), or `NoRuntime`
    /// when called outside a tokio runtime.
    pub fn connect(&self) -> Result<(), StreamError> {
        if self.state().is_closed() {
            return Err(StreamError::ConnectionClosed);
        }

        let mut slot = self.shared.command_rx.lock();
        if slot.is_none() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StreamError::NoRuntime)?;
        let Some(commands) = slot.take() else {
            return Ok(());
        };
        drop(slot);

        runtime.spawn(Arc::clone(&self.shared).run(commands));
        Ok(())
    }

    /// Subscribe `callback` to `topic`.
    ///
    /// Registration is immediate. The subscribe frame goes out as soon as
    /// the connection is ready, and again after every reconnect. A second
    /// callback on the same topic receives the same messages.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` after [`close`](Self::close), or `NoRuntime`
    /// when the connection has to start outside a tokio runtime.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, callback: F) -> Result<(), StreamError>
    where
        F: Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.connect()?;

        let topic = topic.into();
        if self.shared.registry.register(topic.clone(), handler(callback)) {
            tracing::debug!(stream = %self.shared.config.name, topic = %topic, "Topic registered");
            // The run task owns the receiver until it exits, and then the
            // registry replay is moot.
            let _ = self.handles.commands.send(Command::Subscribe(topic));
        }

        metrics::set_subscribed_topics(
            &self.shared.config.name,
            self.shared.registry.topic_count(),
        );
        Ok(())
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        if self.shared.set_state(ConnectionState::Closed) {
            tracing::info!(stream = %self.shared.config.name, "Stream closed");
        }
        self.shared.cancel.cancel();
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Check if the connection is ready.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_ready()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Endpoint this manager connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.config.endpoint
    }

    /// Registered topics and handlers.
    #[must_use]
    pub fn registry(&self) -> Arc<TopicRegistry> {
        Arc::clone(&self.shared.registry)
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("name", &self.shared.config.name)
            .field("endpoint", &self.shared.config.endpoint.url())
            .field("state", &self.state())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Connection Task
// =============================================================================

/// Backoff and auth-failure accounting across attempts.
struct RetryState {
    policy: ReconnectPolicy,
    auth_failures: u32,
}

impl RetryState {
    const fn reset(&mut self) {
        self.policy.reset();
        self.auth_failures = 0;
    }
}

/// Per-connection bookkeeping.
#[derive(Default)]
struct Session {
    ready: bool,
    subscribed: HashSet<Topic>,
}

impl Shared {
    /// Move to `next`. Never leaves `Closed`. Returns whether the state changed.
    fn set_state(&self, next: ConnectionState) -> bool {
        let mut previous = next;
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next || state.is_closed() {
                return false;
            }
            previous = *state;
            *state = next;
            true
        });

        if changed {
            tracing::debug!(
                stream = %self.config.name,
                from = %previous,
                to = %next,
                "Connection state changed"
            );
            metrics::set_connection_state(&self.config.name, next);
        }
        changed
    }

    async fn run(self: Arc<Self>, mut commands: mpsc::UnboundedReceiver<Command>) {
        let settings = &self.config.settings;
        let mut retry = RetryState {
            policy: ReconnectPolicy::new(ReconnectConfig::from_connection_settings(settings)),
            auth_failures: 0,
        };

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let Err(e) = self.connect_and_run(&mut commands, &mut retry).await else {
                break;
            };

            if self.cancel.is_cancelled() {
                break;
            }

            tracing::warn!(stream = %self.config.name, error = %e, "Stream connection error");

            if matches!(e, SessionError::Auth(_)) {
                retry.auth_failures += 1;
                metrics::record_auth_failure(&self.config.name);
                if settings.max_auth_failures > 0
                    && retry.auth_failures >= settings.max_auth_failures
                {
                    tracing::error!(
                        stream = %self.config.name,
                        failures = retry.auth_failures,
                        "Giving up after repeated authentication failures"
                    );
                    break;
                }
            }

            if !settings.restart_on_error {
                tracing::info!(stream = %self.config.name, "Restart on error disabled, closing");
                break;
            }

            let Some(delay) = retry.policy.next_delay() else {
                tracing::error!(
                    stream = %self.config.name,
                    attempts = retry.policy.attempt_count(),
                    "Maximum reconnection attempts exceeded"
                );
                break;
            };

            self.set_state(ConnectionState::Reconnecting);
            metrics::record_reconnect(&self.config.name);
            tracing::info!(
                stream = %self.config.name,
                attempt = retry.policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting"
            );

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        self.cancel.cancel();
        tracing::debug!(stream = %self.config.name, "Connection task finished");
    }

    /// Run one connection until cancellation (`Ok`) or failure (`Err`).
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        retry: &mut RetryState,
    ) -> Result<(), SessionError> {
        let settings = &self.config.settings;
        let url = self.config.endpoint.url();

        self.set_state(ConnectionState::Connecting);
        tracing::info!(stream = %self.config.name, url = %url, "Connecting");

        let connect = tokio::time::timeout(settings.connect_timeout, self.connector.connect(url));
        let (mut sink, mut stream) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = connect => match result {
                Ok(connected) => connected?,
                Err(_) => return Err(SessionError::ConnectTimeout(settings.connect_timeout)),
            },
        };

        let mut session = Session::default();
        let mut auth = self
            .config
            .credentials
            .clone()
            .map(|creds| AuthHandler::new(creds, settings.auth_expires_after));

        if let Some(auth) = auth.as_mut() {
            self.set_state(ConnectionState::Authenticating);
            let request = auth.create_auth_request()?;
            self.send(&mut sink, &request).await?;
        } else {
            self.on_ready(&mut sink, &mut session, retry).await?;
        }

        let heartbeat_state = Arc::new(HeartbeatState::new());
        let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(8);
        let heartbeat_cancel = self.cancel.child_token();
        let _heartbeat_guard = heartbeat_cancel.clone().drop_guard();
        tokio::spawn(
            HeartbeatManager::new(
                HeartbeatConfig::from_connection_settings(settings),
                Arc::clone(&heartbeat_state),
                heartbeat_tx,
                heartbeat_cancel,
            )
            .run(),
        );
        let mut heartbeat_alive = true;

        let auth_deadline = tokio::time::sleep(settings.auth_timeout);
        tokio::pin!(auth_deadline);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
                    return Ok(());
                }
                () = &mut auth_deadline, if !session.ready => {
                    return Err(AuthError::Timeout.into());
                }
                event = heartbeat_rx.recv(), if heartbeat_alive => match event {
                    Some(HeartbeatEvent::SendPing) => {
                        self.send(&mut sink, &OpRequest::ping()).await?;
                        heartbeat_state.mark_ping_sent();
                    }
                    Some(HeartbeatEvent::Timeout) => return Err(SessionError::HeartbeatTimeout),
                    None => heartbeat_alive = false,
                },
                command = commands.recv() => match command {
                    Some(Command::Subscribe(topic)) => {
                        if session.ready && !session.subscribed.contains(&topic) {
                            self.send(&mut sink, &OpRequest::subscribe([topic.clone()])).await?;
                            session.subscribed.insert(topic);
                        }
                    }
                    None => {
                        tracing::debug!(stream = %self.config.name, "Every handle dropped, closing");
                        let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
                        return Ok(());
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => {
                        heartbeat_state.record_activity();
                        metrics::record_frame_received(&self.config.name);
                        self.handle_text(&text, &mut sink, &mut session, auth.as_mut(), retry)
                            .await?;
                    }
                    Some(Ok(Frame::Ping(data))) => {
                        heartbeat_state.record_activity();
                        sink.send(Frame::Pong(data)).await?;
                    }
                    Some(Ok(Frame::Pong(_))) => heartbeat_state.record_activity(),
                    Some(Ok(Frame::Close)) | None => return Err(TransportError::Closed.into()),
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        sink: &mut FrameSink,
        session: &mut Session,
        auth: Option<&mut AuthHandler>,
        retry: &mut RetryState,
    ) -> Result<(), SessionError> {
        tracing::trace!(stream = %self.config.name, frame = %text, "Frame received");

        match self.dispatcher.on_message(text) {
            Ok(Inbound::Dispatched(outcome)) => {
                tracing::trace!(
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    "Message dispatched"
                );
                Ok(())
            }
            Ok(Inbound::Control(control)) => {
                self.handle_control(control, sink, session, auth, retry)
                    .await
            }
            Err(e) => {
                tracing::warn!(stream = %self.config.name, error = %e, "Dropping malformed frame");
                metrics::record_malformed_frame(&self.config.name);
                Ok(())
            }
        }
    }

    async fn handle_control(
        &self,
        control: ControlMessage,
        sink: &mut FrameSink,
        session: &mut Session,
        auth: Option<&mut AuthHandler>,
        retry: &mut RetryState,
    ) -> Result<(), SessionError> {
        match control {
            ControlMessage::Auth(response) => {
                let Some(auth) = auth else {
                    tracing::debug!("Ignoring auth response on unauthenticated stream");
                    return Ok(());
                };
                if auth.on_response(&response)? {
                    tracing::info!(
                        stream = %self.config.name,
                        conn_id = response.conn_id.as_deref().unwrap_or_default(),
                        "Authenticated"
                    );
                    self.on_ready(sink, session, retry).await?;
                } else {
                    tracing::debug!("Ignoring duplicate auth success");
                }
            }
            ControlMessage::Subscribe(response) => {
                if response.is_success() {
                    tracing::debug!(
                        stream = %self.config.name,
                        req_id = response.req_id.as_deref().unwrap_or_default(),
                        "Subscription acknowledged"
                    );
                } else {
                    tracing::warn!(
                        stream = %self.config.name,
                        req_id = response.req_id.as_deref().unwrap_or_default(),
                        ret_msg = %response.ret_msg,
                        "Subscription rejected"
                    );
                }
            }
            ControlMessage::Pong(_) => tracing::trace!("Pong received"),
            ControlMessage::Other(response) => {
                tracing::debug!(op = %response.op, "Ignoring control message");
            }
        }
        Ok(())
    }

    /// Enter `Ready` and replay every registered topic in registration order.
    async fn on_ready(
        &self,
        sink: &mut FrameSink,
        session: &mut Session,
        retry: &mut RetryState,
    ) -> Result<(), SessionError> {
        self.set_state(ConnectionState::Ready);
        retry.reset();

        let topics = self.registry.topics();
        for topic in &topics {
            if session.subscribed.insert(topic.clone()) {
                self.send(sink, &OpRequest::subscribe([topic.clone()]))
                    .await?;
            }
        }
        session.ready = true;

        tracing::info!(stream = %self.config.name, topics = topics.len(), "Stream ready");
        Ok(())
    }

    async fn send(&self, sink: &mut FrameSink, request: &OpRequest) -> Result<(), SessionError> {
        let text = self.codec.encode(request)?;
        tracing::trace!(stream = %self.config.name, op = ?request.op, "Sending frame");
        sink.send(Frame::Text(text)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::FrameStream;
    use crate::domain::channel::ChannelType;

    struct RefusingConnector;

    #[async_trait::async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self, _url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
            Err(TransportError::Connect("refused".to_string()))
        }
    }

    fn config(credentials: Option<Credentials>) -> StreamManagerConfig {
        StreamManagerConfig {
            name: "test".to_string(),
            endpoint: Endpoint::new(ChannelType::Private, "ws://127.0.0.1:1/realtime_private"),
            credentials,
            settings: ConnectionSettings {
                reconnect_delay_initial: Duration::from_millis(5),
                reconnect_delay_max: Duration::from_millis(10),
                ..ConnectionSettings::default()
            },
        }
    }

    fn creds() -> Option<Credentials> {
        Some(Credentials::new("K", "S").unwrap())
    }

    #[test]
    fn private_channel_requires_credentials() {
        let err = StreamManager::new(config(None), Arc::new(RefusingConnector)).unwrap_err();
        assert!(matches!(err, StreamError::Unauthorized(_)));
    }

    #[test]
    fn subscribe_without_runtime_fails() {
        let manager = StreamManager::new(config(creds()), Arc::new(RefusingConnector)).unwrap();
        let err = manager.subscribe("copyTradeOrder", |_msg| Ok(())).unwrap_err();

        assert_eq!(err, StreamError::NoRuntime);
        assert!(manager.registry().is_empty());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn close_before_start_is_terminal() {
        let manager = StreamManager::new(config(creds()), Arc::new(RefusingConnector)).unwrap();
        manager.close();
        manager.close();

        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(
            manager.subscribe("copyTradeOrder", |_msg| Ok(())),
            Err(StreamError::ConnectionClosed)
        );
    }

    #[test]
    fn channel_errors_convert() {
        let err: StreamError = ChannelError::TopicMismatch {
            url: "u".to_string(),
            required: "private".to_string(),
        }
        .into();
        assert_eq!(
            err,
            StreamError::TopicMismatch {
                url: "u".to_string(),
                required: "private".to_string()
            }
        );
    }

    #[tokio::test]
    async fn exhausted_attempts_close_the_stream() {
        let mut cfg = config(creds());
        cfg.settings.max_reconnect_attempts = 2;
        let manager = StreamManager::new(cfg, Arc::new(RefusingConnector)).unwrap();
        let mut changes = manager.state_changes();

        manager.connect().unwrap();

        tokio::time::timeout(Duration::from_secs(2), changes.wait_for(|s| s.is_closed()))
            .await
            .expect("stream should give up")
            .unwrap();
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn restart_disabled_closes_on_first_failure() {
        let mut cfg = config(creds());
        cfg.settings.restart_on_error = false;
        let manager = StreamManager::new(cfg, Arc::new(RefusingConnector)).unwrap();
        let mut changes = manager.state_changes();

        manager.connect().unwrap();

        tokio::time::timeout(Duration::from_secs(1), changes.wait_for(|s| s.is_closed()))
            .await
            .expect("stream should close")
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_task() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingConnector(Arc<AtomicUsize>);

        #[async_trait::async_trait]
        impl Connector for CountingConnector {
            async fn connect(
                &self,
                _url: &str,
            ) -> Result<(FrameSink, FrameStream), TransportError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Connect("refused".to_string()))
            }
        }

        let attempts = Arc::new(AtomicUsize::new(0));
        let manager =
            StreamManager::new(config(creds()), Arc::new(CountingConnector(Arc::clone(&attempts))))
                .unwrap();
        let mut changes = manager.state_changes();
        let other = manager.clone();

        manager.connect().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(attempts.load(Ordering::SeqCst) > 0);

        drop(manager);
        assert!(!other.state().is_closed(), "a live clone keeps the stream open");
        drop(other);

        let _ = tokio::time::timeout(Duration::from_secs(1), changes.wait_for(|s| s.is_closed()))
            .await
            .expect("task should stop");
        assert_eq!(*changes.borrow(), ConnectionState::Closed);

        let settled = attempts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), settled);
    }
}
