//! Bridge registry: routes bus events through module bridges to the transport.

use super::module_bridge::ModuleBridge;
use super::transport::Transport;
use crate::error::{BridgeError, HandlerError};
use crate::events::EventEnvelope;
use crate::handler::{EventHandler, HandlerOutput, HandlerResult};
use crate::system::{EventBus, SubscriptionId};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Priority the registry subscribes with, so domain handlers run first under
/// sequential dispatch.
pub const BRIDGE_HANDLER_PRIORITY: i32 = 1_000;

/// Successful forwarding through one bridge.
#[derive(Debug, Clone)]
pub struct BridgeDelivery {
    pub bridge: String,
    pub channels: Vec<String>,
}

/// Result of [`BridgeRegistry::broadcast`].
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<BridgeDelivery>,
    pub failures: Vec<(String, BridgeError)>,
}

impl BroadcastReport {
    /// No bridge matched the event.
    pub fn is_unrouted(&self) -> bool {
        self.delivered.is_empty() && self.failures.is_empty()
    }

    /// At least one bridge matched and every matching bridge failed.
    pub fn all_failed(&self) -> bool {
        self.delivered.is_empty() && !self.failures.is_empty()
    }
}

/// Registry of module bridges keyed by module name.
///
/// Bridges are explicit: the registry is created by the server and shared as
/// `Arc<BridgeRegistry>`, there is no global instance.
pub struct BridgeRegistry {
    bridges: RwLock<HashMap<String, Arc<dyn ModuleBridge>>>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for BridgeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeRegistry")
            .field("bridges", &"[bridges]")
            .finish()
    }
}

impl BridgeRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            bridges: RwLock::new(HashMap::new()),
            transport,
        }
    }

    /// Registers a bridge under its module name.
    ///
    /// A bridge already registered for the same module is replaced and
    /// returned.
    pub async fn register(&self, bridge: Arc<dyn ModuleBridge>) -> Option<Arc<dyn ModuleBridge>> {
        let module = bridge.module_name().to_string();
        let previous = self.bridges.write().await.insert(module.clone(), bridge);
        if previous.is_some() {
            warn!("⚠️ Bridge for module '{}' replaced", module);
        } else {
            info!("🌉 Registered bridge for module '{}'", module);
        }
        previous
    }

    pub async fn unregister(&self, module: &str) -> bool {
        self.bridges.write().await.remove(module).is_some()
    }

    /// All bridges, lowest priority first (ties by module name).
    pub async fn get_all_bridges(&self) -> Vec<Arc<dyn ModuleBridge>> {
        let mut bridges: Vec<Arc<dyn ModuleBridge>> =
            self.bridges.read().await.values().cloned().collect();
        bridges.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.module_name().cmp(b.module_name()))
        });
        bridges
    }

    /// Bridges whose `can_handle` accepts `event`, in priority order.
    pub async fn find_bridges_for_event(&self, event: &EventEnvelope) -> Vec<Arc<dyn ModuleBridge>> {
        self.get_all_bridges()
            .await
            .into_iter()
            .filter(|bridge| bridge.can_handle(event))
            .collect()
    }

    /// Sends `event` through every matching bridge concurrently.
    ///
    /// A failing bridge never prevents the others from delivering; each
    /// failure is collected in the report.
    pub async fn broadcast(&self, event: &EventEnvelope) -> BroadcastReport {
        let bridges = self.find_bridges_for_event(event).await;
        if bridges.is_empty() {
            debug!("No bridge for {}", event.event_type());
            return BroadcastReport::default();
        }

        let outcomes = join_all(bridges.iter().map(|bridge| async move {
            let name = bridge.module_name().to_string();
            (name, self.forward(bridge.as_ref(), event).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (bridge, outcome) in outcomes {
            match outcome {
                Ok(channels) => report.delivered.push(BridgeDelivery { bridge, channels }),
                Err(e) => {
                    warn!("❌ Bridge '{}' failed for {}: {}", bridge, event.event_type(), e);
                    report.failures.push((bridge, e));
                }
            }
        }
        report
    }

    async fn forward(
        &self,
        bridge: &dyn ModuleBridge,
        event: &EventEnvelope,
    ) -> Result<Vec<String>, BridgeError> {
        let channels = bridge.channels(event);
        if channels.is_empty() {
            return Ok(channels);
        }

        let payload = bridge.transform(event)?;
        for channel in &channels {
            self.transport
                .broadcast(channel, &payload)
                .await
                .map_err(|source| BridgeError::Transport {
                    channel: channel.clone(),
                    source,
                })?;
        }
        Ok(channels)
    }

    /// Subscribes the registry on `bus`, once per event type.
    ///
    /// # Returns
    ///
    /// The subscription ids, in the order of `event_types`.
    pub async fn attach(self: &Arc<Self>, bus: &EventBus, event_types: &[&str]) -> Vec<SubscriptionId> {
        let handler: Arc<dyn EventHandler> = Arc::new(RegistryHandler {
            registry: Arc::clone(self),
        });

        let mut ids = Vec::with_capacity(event_types.len());
        for event_type in event_types {
            ids.push(
                bus.subscribe(event_type, Arc::clone(&handler), BRIDGE_HANDLER_PRIORITY)
                    .await,
            );
        }
        ids
    }
}

/// Bus handler forwarding every event it receives to the registry.
struct RegistryHandler {
    registry: Arc<BridgeRegistry>,
}

#[async_trait]
impl EventHandler for RegistryHandler {
    async fn handle(&self, event: &EventEnvelope) -> HandlerResult {
        let report = self.registry.broadcast(event).await;

        if report.all_failed() {
            return Err(HandlerError::retryable(format!(
                "all {} bridge(s) failed for {}",
                report.failures.len(),
                event.event_type()
            )));
        }
        if !report.failures.is_empty() {
            warn!(
                "⚠️ {} of {} bridge(s) failed for {}",
                report.failures.len(),
                report.failures.len() + report.delivered.len(),
                event.event_type()
            );
        }

        let channels: usize = report.delivered.iter().map(|d| d.channels.len()).sum();
        Ok(HandlerOutput::with_message(format!("forwarded to {channels} channel(s)")))
    }

    fn handler_name(&self) -> &str {
        "bridge_registry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ChannelTransport, GameBridge, LobbyBridge};
    use crate::config::EventBusConfig;
    use crate::error::{FailureKind, TransportError};
    use crate::events::DomainEvent;
    use crate::types::{LobbyId, PlayerId, SessionId};
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that fails every broadcast to a channel starting with `prefix`.
    struct FailingTransport {
        prefix: &'static str,
        inner: ChannelTransport,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FailingTransport {
        async fn broadcast(&self, channel: &str, payload: &Value) -> Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if channel.starts_with(self.prefix) {
                return Err(TransportError::Unavailable("link down".to_string()));
            }
            self.inner.broadcast(channel, payload).await
        }
    }

    /// Second bridge on the lobby module under another name.
    struct AuditBridge;

    impl ModuleBridge for AuditBridge {
        fn module_name(&self) -> &str {
            "audit"
        }

        fn can_handle(&self, event: &EventEnvelope) -> bool {
            event.module() == "lobby"
        }

        fn channels(&self, _event: &EventEnvelope) -> Vec<String> {
            vec!["audit.log".to_string()]
        }
    }

    fn lobby_created() -> EventEnvelope {
        EventEnvelope::new(DomainEvent::LobbyCreated {
            lobby_id: LobbyId::new(),
            name: "test".to_string(),
            owner_id: PlayerId::new(),
            max_players: 2,
            is_private: false,
        })
    }

    #[tokio::test]
    async fn test_bridges_sorted_by_priority_and_replaced() {
        let registry = BridgeRegistry::new(Arc::new(ChannelTransport::default()));
        registry.register(Arc::new(GameBridge::new())).await;
        registry.register(Arc::new(AuditBridge)).await;
        assert!(registry.register(Arc::new(LobbyBridge::new())).await.is_none());
        assert!(registry.register(Arc::new(LobbyBridge::new())).await.is_some());

        let names: Vec<String> = registry
            .get_all_bridges()
            .await
            .iter()
            .map(|b| b.module_name().to_string())
            .collect();
        assert_eq!(names, vec!["lobby", "game", "audit"]);

        let matching = registry.find_bridges_for_event(&lobby_created()).await;
        let names: Vec<&str> = matching.iter().map(|b| b.module_name()).collect();
        assert_eq!(names, vec!["lobby", "audit"]);
    }

    #[tokio::test]
    async fn test_failing_bridge_does_not_block_others() {
        let transport = Arc::new(FailingTransport {
            prefix: "audit",
            inner: ChannelTransport::default(),
            calls: AtomicU32::new(0),
        });
        let mut tap = transport.inner.tap();
        let registry = BridgeRegistry::new(transport.clone());
        registry.register(Arc::new(LobbyBridge::new())).await;
        registry.register(Arc::new(AuditBridge)).await;

        let report = registry.broadcast(&lobby_created()).await;

        assert_eq!(report.delivered.len(), 1);
        assert_eq!(report.delivered[0].bridge, "lobby");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "audit");
        assert!(!report.all_failed());

        let (channel, payload) = tap.recv().await.unwrap();
        assert!(channel.starts_with("lobby."));
        assert_eq!(payload["type"], "lobby.created");
    }

    #[tokio::test]
    async fn test_attached_registry_reports_retryable_when_all_bridges_fail() {
        let transport = Arc::new(FailingTransport {
            prefix: "game",
            inner: ChannelTransport::default(),
            calls: AtomicU32::new(0),
        });
        let registry = Arc::new(BridgeRegistry::new(transport.clone()));
        registry.register(Arc::new(GameBridge::new())).await;

        let bus = Arc::new(EventBus::new(EventBusConfig {
            max_retry_attempts: 1,
            retry_delay_ms: 1,
            ..Default::default()
        }));
        let ids = registry.attach(&bus, &["game.finished"]).await;
        assert_eq!(ids.len(), 1);

        let report = bus
            .publish_and_wait(EventEnvelope::new(DomainEvent::GameFinished {
                session_id: SessionId::new(),
                winner_id: None,
            }))
            .await;

        let result = &report.results[0];
        assert_eq!(result.handler_name, "bridge_registry");
        assert_eq!(result.failure, Some(FailureKind::Retryable));
        assert_eq!(result.attempts, 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unrouted_event_succeeds() {
        let registry = Arc::new(BridgeRegistry::new(Arc::new(ChannelTransport::default())));
        let bus = Arc::new(EventBus::new(EventBusConfig::default()));
        registry.attach(&bus, &["chat.message"]).await;

        let report = bus
            .publish_and_wait(EventEnvelope::custom("chat.message", Value::Null).unwrap())
            .await;
        assert!(report.all_succeeded());
    }
}
