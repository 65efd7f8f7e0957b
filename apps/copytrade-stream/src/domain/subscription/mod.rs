//! Topic Registry
//!
//! Maps topic names to the handlers subscribed to them.
//!
//! # Design
//!
//! - Registering an existing topic appends another handler (fan-out).
//!   Nothing is ever overwritten, so an earlier subscription cannot be lost.
//! - Topics remember their first-registration order, which is the order
//!   subscribe frames are replayed in after a reconnect.
//! - Each topic's handlers live behind an `Arc`. `lookup` clones that `Arc`
//!   and releases the lock, so handlers run with no lock held and a
//!   concurrent `register` never changes a snapshot mid-iteration.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::streaming::StreamMessage;

// =============================================================================
// Types
// =============================================================================

/// A topic name (e.g. `copyTradeOrder`).
pub type Topic = String;

/// Callback invoked for every message on a subscribed topic.
///
/// Returning an error is logged by the dispatcher and does not affect other
/// handlers.
pub type Handler = Arc<dyn Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync>;

/// Snapshot of the handlers registered for one topic.
pub type HandlerSnapshot = Arc<Vec<Handler>>;

/// Box a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&StreamMessage) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
struct RegistryState {
    order: Vec<Topic>,
    handlers: HashMap<Topic, HandlerSnapshot>,
}

// =============================================================================
// Topic Registry
// =============================================================================

/// Thread-safe topic-to-handler registry.
///
/// # Example
///
/// ```rust
/// use copytrade_stream::domain::subscription::{TopicRegistry, handler};
///
/// let registry = TopicRegistry::new();
///
/// assert!(registry.register("copyTradeOrder", handler(|_msg| Ok(()))));
/// // Second handler on the same topic fans out instead of replacing
/// assert!(!registry.register("copyTradeOrder", handler(|_msg| Ok(()))));
///
/// assert_eq!(registry.lookup("copyTradeOrder").len(), 2);
/// assert_eq!(registry.topics(), vec!["copyTradeOrder".to_string()]);
/// ```
#[derive(Default)]
pub struct TopicRegistry {
    state: RwLock<RegistryState>,
}

impl TopicRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to `topic`.
    ///
    /// Returns `true` when this is the first handler for the topic, meaning
    /// a subscribe frame still has to be sent for it.
    pub fn register(&self, topic: impl Into<Topic>, handler: Handler) -> bool {
        let topic = topic.into();
        let mut state = self.state.write();

        if let Some(handlers) = state.handlers.get_mut(&topic) {
            // Clones the vector only while a dispatcher still holds the old snapshot
            Arc::make_mut(handlers).push(handler);
            return false;
        }

        state.order.push(topic.clone());
        state.handlers.insert(topic, Arc::new(vec![handler]));
        true
    }

    /// Handlers registered for `topic`, in registration order.
    #[must_use]
    pub fn lookup(&self, topic: &str) -> HandlerSnapshot {
        self.state
            .read()
            .handlers
            .get(topic)
            .map_or_else(|| Arc::new(Vec::new()), Arc::clone)
    }

    /// Every `(topic, handler)` pair, topics in first-registration order and
    /// handlers in registration order within a topic.
    #[must_use]
    pub fn all(&self) -> Vec<(Topic, Handler)> {
        let state = self.state.read();
        state
            .order
            .iter()
            .flat_map(|topic| {
                state.handlers[topic]
                    .iter()
                    .map(move |handler| (topic.clone(), Arc::clone(handler)))
            })
            .collect()
    }

    /// Distinct topics in first-registration order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.state.read().order.clone()
    }

    /// Check if any handler is registered for `topic`.
    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        self.state.read().handlers.contains_key(topic)
    }

    /// Number of distinct topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.state.read().order.len()
    }

    /// Total number of handlers across all topics.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.state.read().handlers.values().map(|h| h.len()).sum()
    }

    /// Check if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().order.is_empty()
    }
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TopicRegistry")
            .field("topics", &state.order)
            .field(
                "handlers",
                &state.handlers.values().map(|h| h.len()).sum::<usize>(),
            )
            .finish()
    }
}
