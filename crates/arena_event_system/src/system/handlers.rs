/// Event handler registration methods
use super::core::{EventBus, Subscription, SubscriptionId};
use crate::handler::{EventHandler, FnHandler, HandlerResult};
use crate::events::EventEnvelope;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

impl EventBus {
    /// Registers `handler` for `event_type`.
    ///
    /// Lower priorities run first under sequential dispatch; handlers with
    /// equal priority run in registration order. Registration never fails and
    /// the same handler may be registered several times.
    ///
    /// # Arguments
    ///
    /// * `event_type` - Dot-namespaced event type, e.g. `lobby.player.joined`
    /// * `handler` - The handler to invoke for each published event
    /// * `priority` - Sequential dispatch order key
    ///
    /// # Returns
    ///
    /// The token to pass to [`EventBus::unsubscribe`].
    pub async fn subscribe(
        &self,
        event_type: &str,
        handler: Arc<dyn EventHandler>,
        priority: i32,
    ) -> SubscriptionId {
        let id = self.allocate_subscription_id();
        let handler_name = handler.handler_name().to_string();
        let subscription = Subscription {
            id,
            event_type: event_type.to_string(),
            priority,
            handler,
        };

        {
            let mut subscriptions = self.subscriptions.write().await;
            let list = subscriptions.entry(event_type.to_string()).or_default();
            let position = list.partition_point(|s| s.sort_key() <= subscription.sort_key());
            list.insert(position, subscription);
        }

        {
            let mut stats = self.stats.write().await;
            stats.total_subscriptions += 1;
        }

        info!("📝 Registered handler '{handler_name}' for {event_type} ({id}, priority {priority})");
        id
    }

    /// Registers an async closure as a handler.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn example(bus: std::sync::Arc<arena_event_system::EventBus>) {
    /// use arena_event_system::HandlerOutput;
    ///
    /// bus.subscribe_fn("game.finished", 10, "scoreboard", |event| async move {
    ///     Ok(HandlerOutput::with_message(format!("recorded {}", event.id())))
    /// })
    /// .await;
    /// # }
    /// ```
    pub async fn subscribe_fn<F, Fut>(
        &self,
        event_type: &str,
        priority: i32,
        name: impl Into<String>,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.subscribe(event_type, Arc::new(FnHandler::new(name, handler)), priority)
            .await
    }

    /// Registers one handler for several event types at priority 0.
    ///
    /// Returns one subscription id per type, in the order given.
    pub async fn subscribe_to_multiple(
        &self,
        event_types: &[&str],
        handler: Arc<dyn EventHandler>,
    ) -> Vec<SubscriptionId> {
        let mut ids = Vec::with_capacity(event_types.len());
        for event_type in event_types {
            ids.push(self.subscribe(event_type, Arc::clone(&handler), 0).await);
        }
        ids
    }
}
