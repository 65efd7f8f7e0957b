//! Message Dispatcher
//!
//! Routes decoded topic messages to the handlers registered for them.
//!
//! Handlers run synchronously on the connection task in registration order.
//! A handler that errors or panics is logged and counted, and the remaining
//! handlers still run. Messages for topics nobody subscribed to are dropped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::codec::{CodecError, InboundFrame, JsonCodec};
use super::messages::ControlMessage;
use crate::domain::streaming::StreamMessage;
use crate::domain::subscription::TopicRegistry;
use crate::infrastructure::metrics;

/// Result of delivering one topic message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DispatchOutcome {
    /// Check if no handler was registered for the message.
    #[must_use]
    pub const fn is_unrouted(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }
}

/// What the dispatcher did with a raw frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Topic message handed to handlers.
    Dispatched(DispatchOutcome),
    /// Control envelope for the connection manager.
    Control(ControlMessage),
}

/// Routes inbound frames through the topic registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    stream: String,
    registry: Arc<TopicRegistry>,
    codec: JsonCodec,
}

impl Dispatcher {
    /// Create a dispatcher for `stream` over `registry`.
    #[must_use]
    pub fn new(stream: impl Into<String>, registry: Arc<TopicRegistry>) -> Self {
        Self {
            stream: stream.into(),
            registry,
            codec: JsonCodec::new(),
        }
    }

    /// Decode `raw` and dispatch it if it is a topic message.
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` when the frame cannot be decoded. The caller
    /// logs and drops it.
    pub fn on_message(&self, raw: &str) -> Result<Inbound, CodecError> {
        match self.codec.decode(raw)? {
            InboundFrame::Topic(message) => Ok(Inbound::Dispatched(self.dispatch(&message))),
            InboundFrame::Control(control) => Ok(Inbound::Control(control)),
        }
    }

    /// Invoke every handler registered for `message.topic`.
    pub fn dispatch(&self, message: &StreamMessage) -> DispatchOutcome {
        let handlers = self.registry.lookup(&message.topic);
        let mut outcome = DispatchOutcome::default();

        if handlers.is_empty() {
            tracing::trace!(topic = %message.topic, "No handler registered, dropping message");
            // Venue-chosen topics never become label values.
            metrics::record_message_unrouted(&self.stream);
            return outcome;
        }

        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        topic = %message.topic,
                        handler = index,
                        error = %e,
                        "Handler returned an error"
                    );
                    metrics::record_handler_failure(&message.topic);
                }
                Err(panic) => {
                    outcome.failed += 1;
                    tracing::error!(
                        topic = %message.topic,
                        handler = index,
                        panic = panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                    metrics::record_handler_failure(&message.topic);
                }
            }
        }

        metrics::record_message_dispatched(&message.topic);
        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::subscription::handler;

    fn counting(counter: &Arc<AtomicUsize>) -> crate::domain::subscription::Handler {
        let counter = Arc::clone(counter);
        handler(move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn routes_only_matching_topic() {
        let registry = Arc::new(TopicRegistry::new());
        let orders = Arc::new(AtomicUsize::new(0));
        let wallet = Arc::new(AtomicUsize::new(0));
        registry.register("copyTradeOrder", counting(&orders));
        registry.register("copyTradeWallet", counting(&wallet));

        let dispatcher = Dispatcher::new("test", registry);
        let inbound = dispatcher
            .on_message(r#"{"topic":"copyTradeOrder","data":[]}"#)
            .unwrap();

        assert_eq!(
            inbound,
            Inbound::Dispatched(DispatchOutcome {
                delivered: 1,
                failed: 0
            })
        );
        assert_eq!(orders.load(Ordering::SeqCst), 1);
        assert_eq!(wallet.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unrouted_topic_is_dropped() {
        let dispatcher = Dispatcher::new("test", Arc::new(TopicRegistry::new()));
        let inbound = dispatcher
            .on_message(r#"{"topic":"copyTradePosition","data":{}}"#)
            .unwrap();

        match inbound {
            Inbound::Dispatched(outcome) => assert!(outcome.is_unrouted()),
            Inbound::Control(other) => panic!("unexpected control {other:?}"),
        }
    }

    #[test]
    fn control_frames_are_returned() {
        let dispatcher = Dispatcher::new("test", Arc::new(TopicRegistry::new()));
        let inbound = dispatcher
            .on_message(r#"{"success":true,"ret_msg":"","op":"subscribe","conn_id":"c"}"#)
            .unwrap();
        assert!(matches!(
            inbound,
            Inbound::Control(ControlMessage::Subscribe(_))
        ));
    }

    #[test]
    fn malformed_frame_is_an_error() {
        let dispatcher = Dispatcher::new("test", Arc::new(TopicRegistry::new()));
        assert!(dispatcher.on_message("{not json").is_err());
    }

    #[test]
    fn failing_and_panicking_handlers_are_isolated() {
        let registry = Arc::new(TopicRegistry::new());
        let reached = Arc::new(AtomicUsize::new(0));

        registry.register(
            "copyTradeOrder",
            handler(|_msg| Err(anyhow::anyhow!("handler exploded"))),
        );
        registry.register("copyTradeOrder", handler(|_msg| panic!("handler panicked")));
        registry.register("copyTradeOrder", counting(&reached));

        let dispatcher = Dispatcher::new("test", registry);
        let message = StreamMessage::new("copyTradeOrder", serde_json::json!([]));

        let first = dispatcher.dispatch(&message);
        let second = dispatcher.dispatch(&message);

        assert_eq!(
            first,
            DispatchOutcome {
                delivered: 1,
                failed: 2
            }
        );
        assert_eq!(first, second);
        assert_eq!(reached.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = Arc::new(TopicRegistry::new());
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            registry.register(
                "copyTradeExecution",
                handler(move |_msg| {
                    log.lock().push(tag);
                    Ok(())
                }),
            );
        }

        Dispatcher::new("test", registry)
            .dispatch(&StreamMessage::new("copyTradeExecution", serde_json::Value::Null));

        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[derive(Default)]
    struct KeyCapture(parking_lot::Mutex<Vec<::metrics::Key>>);

    impl ::metrics::Recorder for KeyCapture {
        fn describe_counter(
            &self,
            _: ::metrics::KeyName,
            _: Option<::metrics::Unit>,
            _: ::metrics::SharedString,
        ) {
        }
        fn describe_gauge(
            &self,
            _: ::metrics::KeyName,
            _: Option<::metrics::Unit>,
            _: ::metrics::SharedString,
        ) {
        }
        fn describe_histogram(
            &self,
            _: ::metrics::KeyName,
            _: Option<::metrics::Unit>,
            _: ::metrics::SharedString,
        ) {
        }
        fn register_counter(
            &self,
            key: &::metrics::Key,
            _: &::metrics::Metadata<'_>,
        ) -> ::metrics::Counter {
            self.0.lock().push(key.clone());
            ::metrics::Counter::noop()
        }
        fn register_gauge(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Gauge {
            ::metrics::Gauge::noop()
        }
        fn register_histogram(
            &self,
            _: &::metrics::Key,
            _: &::metrics::Metadata<'_>,
        ) -> ::metrics::Histogram {
            ::metrics::Histogram::noop()
        }
    }

    #[test]
    fn unrouted_metric_is_labelled_by_stream_not_topic() {
        let capture = KeyCapture::default();
        ::metrics::with_local_recorder(&capture, || {
            let dispatcher = Dispatcher::new("copytrading", Arc::new(TopicRegistry::new()));
            for topic in ["copyTradeLeverage", "anything.the.venue.sends"] {
                dispatcher.dispatch(&StreamMessage::new(topic, serde_json::Value::Null));
            }
        });

        let keys = capture.0.lock();
        let unrouted: Vec<Vec<(String, String)>> = keys
            .iter()
            .filter(|key| key.name() == "copytrade_stream_messages_unrouted_total")
            .map(|key| {
                key.labels()
                    .map(|label| (label.key().to_string(), label.value().to_string()))
                    .collect()
            })
            .collect();

        assert_eq!(unrouted.len(), 2);
        for labels in unrouted {
            assert_eq!(labels, [("stream".to_string(), "copytrading".to_string())]);
        }
    }

    #[test]
    fn panic_message_extracts_text() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static text");
        assert_eq!(panic_message(boxed.as_ref()), "static text");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
