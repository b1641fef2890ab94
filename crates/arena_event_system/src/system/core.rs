/// Core EventBus implementation
use super::stats::EventBusStats;
use crate::config::EventBusConfig;
use crate::error::EventError;
use crate::events::EventEnvelope;
use crate::handler::EventHandler;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Token returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A handler registered for one event type.
///
/// Ordering within an event type is `(priority, id)`: lower priorities run
/// first under sequential dispatch and ties keep registration order, since
/// ids are allocated monotonically.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub event_type: String,
    pub priority: i32,
    pub handler: Arc<dyn EventHandler>,
}

impl Subscription {
    pub fn handler_name(&self) -> &str {
        self.handler.handler_name()
    }

    pub(super) fn sort_key(&self) -> (i32, SubscriptionId) {
        (self.priority, self.id)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("priority", &self.priority)
            .field("handler", &self.handler.handler_name())
            .finish()
    }
}

/// The central publish/subscribe distributor.
///
/// The bus owns the subscription table, the dispatch policy and delivery
/// statistics. It is always shared as `Arc<EventBus>`: parallel dispatch
/// spawns tasks that keep the bus alive until they finish.
///
/// # Thread Safety
///
/// The subscription table and statistics live behind async read-write locks.
/// Dispatch clones the matching subscriptions out of the table before any
/// handler runs, so handlers may subscribe or unsubscribe freely without
/// affecting the in-flight publish.
///
/// # Examples
///
/// ```rust,no_run
/// use arena_event_system::*;
///
/// # async fn example() -> Result<(), EventError> {
/// let bus = create_event_bus();
///
/// bus.subscribe_fn("lobby.created", 0, "welcome", |event| async move {
///     println!("lobby created: {:?}", event.payload());
///     Ok(HandlerOutput::done())
/// })
/// .await;
///
/// let report = bus
///     .publish_and_wait(EventEnvelope::custom("lobby.created", serde_json::json!({}))?)
///     .await;
/// assert_eq!(report.results.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct EventBus {
    /// Map of event types to their subscriptions, kept sorted by `(priority, id)`
    pub(super) subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    /// Delivery statistics
    pub(super) stats: RwLock<EventBusStats>,
    /// Bounded history of published envelopes, used when the event store is enabled
    pub(super) event_store: RwLock<VecDeque<EventEnvelope>>,
    /// Monotonic id source for subscriptions
    pub(super) next_subscription_id: AtomicU64,
    pub(super) config: EventBusConfig,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &"[subscriptions]")
            .field("stats", &"[stats]")
            .field("config", &self.config)
            .finish()
    }
}

impl EventBus {
    /// Creates a new bus with no subscriptions.
    ///
    /// An invalid configuration is repaired rather than rejected: a zero
    /// handler timeout falls back to the default and a zero event store
    /// capacity disables the store. Use [`EventBus::try_new`] to reject it
    /// instead.
    pub fn new(config: EventBusConfig) -> Self {
        let mut config = config;
        if config.handler_timeout_ms == 0 {
            warn!("⚠️ handler_timeout_ms must be > 0, falling back to the default");
            config.handler_timeout_ms = EventBusConfig::default().handler_timeout_ms;
        }
        if config.enable_event_store && config.event_store_capacity == 0 {
            warn!("⚠️ event_store_capacity is 0, disabling the event store");
            config.enable_event_store = false;
        }

        Self {
            subscriptions: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventBusStats::default()),
            event_store: RwLock::new(VecDeque::new()),
            next_subscription_id: AtomicU64::new(1),
            config,
        }
    }

    /// Creates a new bus, rejecting an invalid configuration.
    pub fn try_new(config: EventBusConfig) -> Result<Self, EventError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Gets the current event bus statistics
    pub async fn get_stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }

    pub(super) fn allocate_subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Snapshot of the subscriptions for `event_type`, in dispatch order.
    pub(super) async fn snapshot(&self, event_type: &str) -> Vec<Subscription> {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.get(event_type).cloned().unwrap_or_default()
    }
}
