//! Topic-based publish/subscribe bus with bounded message history.
//!
//! Dispatch is synchronous: `publish` invokes every handler of the topic on
//! the caller's stack, in subscription order, before returning. Handlers may
//! publish or subscribe re-entrantly; no lock is held while a handler runs.
//! A handler that returns an error or panics is logged and skipped, and the
//! remaining handlers still run.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::simulation_event::{EventBusMessage, SimulationEvent};

// ---------------------------------------------------------------------------
// Global singleton
// ---------------------------------------------------------------------------

static GLOBAL_EVENT_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// Window used by [`EventBus::recent_topic_messages`].
pub const DEFAULT_TOPIC_LIMIT: usize = 50;

const DEFAULT_HISTORY_CAPACITY: usize = 1000;
const DEFAULT_EVICTION_BATCH: usize = 100;

// ---------------------------------------------------------------------------
// Handler types
// ---------------------------------------------------------------------------

/// A message handler. Errors are logged by the bus and never reach the publisher.
pub type MessageHandler = Arc<dyn Fn(&EventBusMessage) -> anyhow::Result<()> + Send + Sync>;

static HANDLER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
struct HandlerEntry {
    id: u64,
    handler: MessageHandler,
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it leaves the handler registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove exactly this handler.
pub struct Subscription {
    topic: String,
    handler_id: u64,
    bus: Weak<EventBus>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription({}:{})", self.topic, self.handler_id)
    }
}

impl Subscription {
    /// Topic the handler listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.remove_handler(&self.topic, self.handler_id),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Handler count of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSubscribers {
    pub topic: String,
    pub handler_count: usize,
}

/// Point-in-time view of the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStatistics {
    /// Messages currently retained.
    pub total_messages: usize,
    /// Topics with at least one handler.
    pub active_subscribers: Vec<TopicSubscribers>,
    /// Retained messages per topic.
    pub topic_message_counts: BTreeMap<String, usize>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// In-process bus; share it as `Arc<EventBus>`.
pub struct EventBus {
    /// Handlers keyed by topic, in subscription order.
    subscribers: RwLock<HashMap<String, Vec<HandlerEntry>>>,
    /// Retained messages, oldest first.
    history: Mutex<VecDeque<EventBusMessage>>,
    active: AtomicBool,
    history_capacity: usize,
    eviction_batch: usize,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.subscribers.read().len())
            .field("history", &self.history.lock().len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Active bus retaining up to 1000 messages, trimmed in batches of 100.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY, DEFAULT_EVICTION_BATCH)
    }

    /// Bus that evicts once history exceeds `capacity`, trimming it to
    /// `capacity - eviction_batch` messages.
    pub fn with_capacity(capacity: usize, eviction_batch: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            active: AtomicBool::new(true),
            history_capacity: capacity,
            eviction_batch: eviction_batch.min(capacity),
        }
    }

    /// Process-wide bus, created on first access.
    pub fn global() -> Arc<EventBus> {
        GLOBAL_EVENT_BUS
            .get_or_init(|| Arc::new(EventBus::new()))
            .clone()
    }

    // -----------------------------------------------------------------------
    // Publish / subscribe
    // -----------------------------------------------------------------------

    /// Wrap `event` in a new message, retain it, and dispatch it to the
    /// topic's handlers. Returns the message, or `None` when the bus is
    /// inactive.
    pub fn publish(
        &self,
        topic: &str,
        agent_id: &str,
        event: SimulationEvent,
        metadata: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Option<EventBusMessage> {
        if !self.is_active() {
            return None;
        }

        let message = EventBusMessage {
            message_id: format!("msg-{}", Uuid::new_v4()),
            topic: topic.to_string(),
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            event,
            metadata,
        };

        self.retain(message.clone());

        // Snapshot so handlers can (un)subscribe while we dispatch.
        let handlers: Vec<HandlerEntry> = self
            .subscribers
            .read()
            .get(topic)
            .cloned()
            .unwrap_or_default();

        for entry in &handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (entry.handler)(&message)
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("[EventBus] Handler error for topic {topic}: {e:#}");
                }
                Err(panic) => {
                    log::error!("[EventBus] Handler panic for topic {topic}: {panic:?}");
                }
            }
        }

        log::debug!(
            "[EventBus] Published to {}: agent={} type={} details={}",
            topic,
            agent_id,
            message.event.event_type,
            truncate(&message.event.details, 50)
        );

        Some(message)
    }

    /// Register `handler` for `topic`.
    pub fn subscribe<F>(self: &Arc<Self>, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&EventBusMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = HANDLER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(HandlerEntry {
                id,
                handler: Arc::new(handler),
            });

        log::info!("[EventBus] New subscriber for topic: {topic}");

        Subscription {
            topic: topic.to_string(),
            handler_id: id,
            bus: Arc::downgrade(self),
        }
    }

    fn remove_handler(&self, topic: &str, handler_id: u64) -> bool {
        let mut map = self.subscribers.write();
        let Some(entries) = map.get_mut(topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != handler_id);
        before != entries.len()
    }

    fn retain(&self, message: EventBusMessage) {
        let mut history = self.history.lock();
        history.push_back(message);
        if history.len() > self.history_capacity {
            let keep = self.history_capacity - self.eviction_batch;
            let evict = history.len() - keep;
            history.drain(..evict);
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Retained messages about `agent_id`, oldest first.
    pub fn agent_event_history(&self, agent_id: &str) -> Vec<EventBusMessage> {
        self.history
            .lock()
            .iter()
            .filter(|m| m.agent_id == agent_id)
            .cloned()
            .collect()
    }

    /// The most recent `limit` messages of `topic`, oldest first.
    pub fn topic_messages(&self, topic: &str, limit: usize) -> Vec<EventBusMessage> {
        let history = self.history.lock();
        let mut recent: Vec<EventBusMessage> = history
            .iter()
            .rev()
            .filter(|m| m.topic == topic)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// [`topic_messages`](Self::topic_messages) with the default window of
    /// [`DEFAULT_TOPIC_LIMIT`] messages.
    pub fn recent_topic_messages(&self, topic: &str) -> Vec<EventBusMessage> {
        self.topic_messages(topic, DEFAULT_TOPIC_LIMIT)
    }

    /// Number of retained messages across all topics.
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Message counts per topic and live handler counts.
    pub fn statistics(&self) -> BusStatistics {
        let mut topic_message_counts = BTreeMap::new();
        let total_messages = {
            let history = self.history.lock();
            for msg in history.iter() {
                *topic_message_counts.entry(msg.topic.clone()).or_insert(0) += 1;
            }
            history.len()
        };

        let mut active_subscribers: Vec<TopicSubscribers> = self
            .subscribers
            .read()
            .iter()
            .map(|(topic, handlers)| TopicSubscribers {
                topic: topic.clone(),
                handler_count: handlers.len(),
            })
            .collect();
        active_subscribers.sort_by(|a, b| a.topic.cmp(&b.topic));

        BusStatistics {
            total_messages,
            active_subscribers,
            topic_message_counts,
            is_active: self.is_active(),
        }
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Toggle whether `publish` does anything. History and subscribers are kept.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
        log::info!(
            "[EventBus] {}",
            if active { "Activated" } else { "Deactivated" }
        );
    }

    /// Drop retained history only.
    pub fn clear_history(&self) {
        self.history.lock().clear();
        log::info!("[EventBus] Message history cleared");
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::simulation_event::EventType;
    use std::sync::atomic::AtomicUsize;

    fn event(details: &str) -> SimulationEvent {
        SimulationEvent::new(EventType::SocialInteraction, details)
    }

    #[test]
    fn test_publish_without_subscribers_is_retained() {
        let bus = Arc::new(EventBus::new());
        let msg = bus.publish("nobody-listens", "agent-1", event("hello"), None);
        assert!(msg.is_some());
        assert_eq!(bus.history_len(), 1);
        assert!(msg.unwrap().message_id.starts_with("msg-"));
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = Arc::new(EventBus::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            bus.subscribe("t", move |_| {
                order.lock().push(i);
                Ok(())
            });
        }
        bus.publish("t", "a", event("x"), None);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_others() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe("t", |_| anyhow::bail!("boom"));
        bus.subscribe("t", |_| panic!("handler panic"));
        let h = hits.clone();
        bus.subscribe("t", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(bus.publish("t", "a", event("x"), None).is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h1 = hits.clone();
        let first = bus.subscribe("t", move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let h2 = hits.clone();
        let _second = bus.subscribe("t", move |_| {
            h2.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        assert!(first.unsubscribe());
        bus.publish("t", "a", event("x"), None);
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_inactive_bus_ignores_publish() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.subscribe("t", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.set_active(false);
        assert!(bus.publish("t", "a", event("x"), None).is_none());
        assert_eq!(bus.history_len(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.set_active(true);
        bus.publish("t", "a", event("x"), None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.statistics().active_subscribers[0].handler_count, 1);
    }

    #[test]
    fn test_batched_eviction() {
        let bus = EventBus::new();
        for i in 0..1000 {
            bus.publish("t", "a", event(&format!("m{i}")), None);
        }
        assert_eq!(bus.history_len(), 1000);

        bus.publish("t", "a", event("overflow"), None);
        assert!(bus.history_len() <= 900);

        let oldest = &bus.topic_messages("t", 1000)[0];
        assert_ne!(oldest.event.details, "m0");
        let newest = bus.topic_messages("t", 1).pop().unwrap();
        assert_eq!(newest.event.details, "overflow");
    }

    #[test]
    fn test_topic_messages_returns_most_recent_window() {
        let bus = EventBus::new();
        for i in 0..10 {
            bus.publish("a", "x", event(&format!("a{i}")), None);
            bus.publish("b", "x", event(&format!("b{i}")), None);
        }
        let recent = bus.topic_messages("a", 3);
        let details: Vec<_> = recent.iter().map(|m| m.event.details.as_str()).collect();
        assert_eq!(details, vec!["a7", "a8", "a9"]);
        assert_eq!(bus.topic_messages("a", 100).len(), 10);
        assert!(bus.topic_messages("c", 5).is_empty());
    }

    #[test]
    fn test_recent_topic_messages_uses_default_window() {
        let bus = EventBus::new();
        for i in 0..(DEFAULT_TOPIC_LIMIT + 20) {
            bus.publish("a", "x", event(&format!("a{i}")), None);
        }
        let recent = bus.recent_topic_messages("a");
        assert_eq!(recent.len(), DEFAULT_TOPIC_LIMIT);
        assert_eq!(recent[0].event.details, "a20");
        assert_eq!(
            recent.last().unwrap().event.details,
            format!("a{}", DEFAULT_TOPIC_LIMIT + 19)
        );
    }

    #[test]
    fn test_agent_history_and_statistics() {
        let bus = Arc::new(EventBus::new());
        let _sub = bus.subscribe("a", |_| Ok(()));
        bus.publish("a", "agent-1", event("one"), None);
        bus.publish("b", "agent-2", event("two"), None);
        bus.publish("a", "agent-1", event("three"), None);

        let history = bus.agent_event_history("agent-1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event.details, "one");
        assert_eq!(history[1].event.details, "three");

        let stats = bus.statistics();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.topic_message_counts.get("a"), Some(&2));
        assert_eq!(stats.topic_message_counts.get("b"), Some(&1));
        assert!(stats.is_active);

        bus.clear_history();
        assert_eq!(bus.statistics().total_messages, 0);
        assert_eq!(bus.statistics().active_subscribers.len(), 1);
    }

    #[test]
    fn test_handler_may_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let weak = Arc::downgrade(&bus);
        bus.subscribe("in", move |msg| {
            if let Some(bus) = weak.upgrade() {
                bus.publish("out", &msg.agent_id, msg.event.clone(), None);
            }
            Ok(())
        });

        bus.publish("in", "agent-7", event("relay"), None);
        assert_eq!(bus.topic_messages("out", 10).len(), 1);
        assert_eq!(bus.history_len(), 2);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 50), "short");
    }
}
