//! Server assembly.
//!
//! [`ArenaServer`] builds every component from a [`Config`] and wires them
//! together: the event bus, the bridge registry forwarding domain events to
//! the transport, the two-tier lobby store, the game engine and the lobby
//! service that drives them.

use crate::config::Config;
use crate::error::ServerError;
use crate::lobby::{open_durable_store, DurableLobbyStore, HybridLobbyStore};
use crate::service::LobbyService;
use arena_event_system::{
    BridgeRegistry, ChannelTransport, EventBus, EventBusStats, GameBridge, LobbyBridge,
    BUILTIN_EVENT_TYPES,
};
use arena_plugin_system::{GameEngine, GamePluginRegistry};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// A fully wired lobby server.
///
/// # Architecture
///
/// * **Event bus**: every committed command publishes domain events here
/// * **Bridges**: the `lobby` and `game` bridges subscribe to every built-in
///   event type and forward to per-lobby and per-session transport channels
/// * **Lobby store**: fast in-memory tier in front of the configured durable
///   backend
/// * **Game engine**: plugin registry with the built-in games
pub struct ArenaServer {
    config: Config,
    bus: Arc<EventBus>,
    transport: Arc<ChannelTransport>,
    bridges: Arc<BridgeRegistry>,
    service: Arc<LobbyService>,
    shutdown_sender: broadcast::Sender<()>,
}

impl ArenaServer {
    /// Builds a server with the durable store named in `config.storage`.
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] for an invalid configuration and
    /// [`ServerError::Storage`] if the durable store cannot be opened.
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;
        let durable = open_durable_store(&config.storage).await?;
        Self::with_durable_store(config, durable).await
    }

    /// Builds a server on top of an existing durable store.
    pub async fn with_durable_store(
        config: Config,
        durable: Arc<dyn DurableLobbyStore>,
    ) -> Result<Self, ServerError> {
        let bus = Arc::new(EventBus::try_new(config.event_bus.clone())?);

        let transport = Arc::new(ChannelTransport::default());
        let bridges = Arc::new(BridgeRegistry::new(transport.clone()));
        bridges.register(Arc::new(LobbyBridge::new())).await;
        bridges.register(Arc::new(GameBridge::new())).await;
        bridges.attach(&bus, &BUILTIN_EVENT_TYPES).await;

        let registry = Arc::new(GamePluginRegistry::with_builtin_games());
        let engine = Arc::new(GameEngine::new(registry));
        let store = Arc::new(HybridLobbyStore::new(durable));
        let service = Arc::new(LobbyService::new(
            store,
            bus.clone(),
            engine,
            config.lobby.clone(),
        ));
        let (shutdown_sender, _) = broadcast::channel(1);

        info!(
            "🏟️ Arena server ready ({:?} storage, {} dispatch)",
            config.storage.backend,
            if config.event_bus.parallel_processing {
                "parallel"
            } else {
                "sequential"
            }
        );

        Ok(Self {
            config,
            bus,
            transport,
            bridges,
            service,
            shutdown_sender,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> Arc<LobbyService> {
        self.service.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn transport(&self) -> Arc<ChannelTransport> {
        self.transport.clone()
    }

    pub fn bridges(&self) -> Arc<BridgeRegistry> {
        self.bridges.clone()
    }

    /// A receiver notified once [`ArenaServer::shutdown`] is called.
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_sender.subscribe()
    }

    pub async fn stats(&self) -> EventBusStats {
        self.bus.get_stats().await
    }

    /// Stops the server: notifies shutdown listeners, closes every transport
    /// channel and logs the final event statistics.
    pub async fn shutdown(&self) -> EventBusStats {
        info!("🛑 Shutting down arena server");
        if self.shutdown_sender.send(()).is_err() {
            warn!("No shutdown listeners registered");
        }
        self.transport.close();

        let stats = self.bus.get_stats().await;
        info!(
            "📊 Events published: {}, processed: {}, without handlers: {}, handler errors: {}",
            stats.events_published,
            stats.events_processed,
            stats.zero_handler_events,
            stats.total_errors()
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::InMemoryDurableStore;
    use crate::service::CreateLobbyRequest;
    use arena_event_system::{lobby_channel, PlayerId, LOBBY_LIST_CHANNEL};

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.lobby.max_players_limit = 1;
        assert!(matches!(
            ArenaServer::new(config).await,
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_bridges_attached_to_every_builtin_event() {
        let server = ArenaServer::new(Config::default()).await.unwrap();
        let registered = server.bus().registered_event_types().await;
        assert_eq!(registered.len(), BUILTIN_EVENT_TYPES.len());
        for event_type in BUILTIN_EVENT_TYPES {
            assert_eq!(server.bus().subscription_count(event_type).await, 1);
        }
        assert_eq!(server.bridges().get_all_bridges().await.len(), 2);
    }

    #[tokio::test]
    async fn test_commands_reach_transport() {
        let mut config = Config::default();
        config.event_bus.parallel_processing = false;
        let server = ArenaServer::with_durable_store(config, Arc::new(InMemoryDurableStore::new()))
            .await
            .unwrap();
        let mut tap = server.transport().tap();

        let lobby = server
            .service()
            .create_lobby(PlayerId::new(), CreateLobbyRequest::new("duel"))
            .await
            .unwrap();

        let mut channels = Vec::new();
        while let Ok((channel, payload)) = tap.try_recv() {
            assert_eq!(payload["type"], "lobby.created");
            channels.push(channel);
        }
        channels.sort();
        let mut expected = vec![lobby_channel(lobby.id), LOBBY_LIST_CHANNEL.to_string()];
        expected.sort();
        assert_eq!(channels, expected);

        let stats = server.shutdown().await;
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.total_errors(), 0);
    }
}
