/// Subscription management and diagnostics
use super::core::{EventBus, SubscriptionId};
use crate::events::EventEnvelope;
use tracing::{debug, info};

impl EventBus {
    /// Removes a single subscription.
    ///
    /// Returns `true` if the subscription existed. An in-flight dispatch that
    /// already took its snapshot still runs the handler once.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut subscriptions = self.subscriptions.write().await;
            let mut removed = None;
            for (event_type, list) in subscriptions.iter_mut() {
                if let Some(position) = list.iter().position(|s| s.id == id) {
                    let subscription = list.remove(position);
                    removed = Some((event_type.clone(), subscription.handler_name().to_string()));
                    break;
                }
            }
            if let Some((event_type, _)) = &removed {
                if subscriptions.get(event_type).is_some_and(|l| l.is_empty()) {
                    subscriptions.remove(event_type);
                }
            }
            removed
        };

        match removed {
            Some((event_type, handler_name)) => {
                let mut stats = self.stats.write().await;
                stats.total_subscriptions = stats.total_subscriptions.saturating_sub(1);
                info!("🗑️ Removed handler '{handler_name}' from {event_type} ({id})");
                true
            }
            None => {
                debug!("Unsubscribe for unknown {id}");
                false
            }
        }
    }

    /// Removes every subscription for `event_type`, returning how many were removed.
    pub async fn unsubscribe_all(&self, event_type: &str) -> usize {
        let removed = {
            let mut subscriptions = self.subscriptions.write().await;
            subscriptions.remove(event_type).map(|l| l.len()).unwrap_or(0)
        };

        if removed > 0 {
            let mut stats = self.stats.write().await;
            stats.total_subscriptions = stats.total_subscriptions.saturating_sub(removed);
            info!("🗑️ Removed {removed} handler(s) from {event_type}");
        }
        removed
    }

    /// Number of live subscriptions for `event_type`.
    pub async fn subscription_count(&self, event_type: &str) -> usize {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.get(event_type).map(|l| l.len()).unwrap_or(0)
    }

    /// Event types with at least one subscription, sorted.
    pub async fn registered_event_types(&self) -> Vec<String> {
        let subscriptions = self.subscriptions.read().await;
        let mut types: Vec<String> = subscriptions.keys().cloned().collect();
        types.sort();
        types
    }

    /// The most recent published envelopes, newest last.
    ///
    /// Always empty unless `enable_event_store` is set.
    pub async fn recent_events(&self, limit: usize) -> Vec<EventEnvelope> {
        let store = self.event_store.read().await;
        let skip = store.len().saturating_sub(limit);
        store.iter().skip(skip).cloned().collect()
    }

    pub(super) async fn record_in_store(&self, event: &EventEnvelope) {
        if !self.config.enable_event_store {
            return;
        }
        let mut store = self.event_store.write().await;
        while store.len() >= self.config.event_store_capacity {
            store.pop_front();
        }
        store.push_back(event.clone());
    }
}
