//! Two-tier lobby storage.
//!
//! The fast tier holds every active lobby in memory and answers all hot-path
//! reads. The durable tier only receives lobbies that satisfy the persistence
//! predicate (status `starting`). The tiers are not updated atomically: a
//! lookup that misses the fast tier falls through to the durable tier and
//! backfills what it finds.

use super::model::Lobby;
use crate::error::StoreError;
use arena_event_system::{LobbyId, LobbyStatus, PlayerId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable backing store for lobbies.
#[async_trait]
pub trait DurableLobbyStore: Send + Sync + std::fmt::Debug {
    /// Inserts or replaces a lobby
    async fn save(&self, lobby: &Lobby) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: LobbyId) -> Result<Option<Lobby>, StoreError>;

    /// Removes a lobby; [`StoreError::NotFound`] if it was never stored
    async fn delete(&self, id: LobbyId) -> Result<(), StoreError>;

    /// Every stored lobby
    async fn find_active(&self) -> Result<Vec<Lobby>, StoreError>;
}

/// Fast in-memory tier in front of a [`DurableLobbyStore`].
#[derive(Debug)]
pub struct HybridLobbyStore {
    fast: DashMap<LobbyId, Lobby>,
    durable: Arc<dyn DurableLobbyStore>,
}

impl HybridLobbyStore {
    pub fn new(durable: Arc<dyn DurableLobbyStore>) -> Self {
        Self {
            fast: DashMap::new(),
            durable,
        }
    }

    /// Lobbies meeting this predicate are written to the durable tier.
    pub fn should_persist(lobby: &Lobby) -> bool {
        lobby.status == LobbyStatus::Starting
    }

    /// Looks a lobby up, falling back to the durable tier.
    ///
    /// A durable hit is copied into the fast tier so the next lookup does not
    /// touch the durable store.
    pub async fn find_by_uuid(&self, id: LobbyId) -> Result<Option<Lobby>, StoreError> {
        if let Some(lobby) = self.fast.get(&id) {
            return Ok(Some(lobby.clone()));
        }

        match self.durable.find_by_id(id).await? {
            Some(lobby) => {
                debug!("♻️ Backfilled lobby {} from durable store", id);
                self.fast.insert(id, lobby.clone());
                Ok(Some(lobby))
            }
            None => Ok(None),
        }
    }

    /// Commits a lobby.
    ///
    /// The durable tier is written first when the lobby meets the persistence
    /// predicate; if that fails nothing is committed.
    pub async fn save(&self, lobby: &Lobby) -> Result<(), StoreError> {
        if Self::should_persist(lobby) {
            self.durable.save(lobby).await?;
            debug!("💾 Persisted lobby {}", lobby.id);
        }
        self.fast.insert(lobby.id, lobby.clone());
        Ok(())
    }

    /// Removes a lobby from both tiers.
    ///
    /// Returns whether anything was removed. A durable failure is ignored for
    /// lobbies that never met the persistence predicate; for persisted ones
    /// the fast-tier entry is restored and the error returned.
    pub async fn delete(&self, id: LobbyId) -> Result<bool, StoreError> {
        let removed = self.fast.remove(&id).map(|(_, lobby)| lobby);
        let persisted = removed.as_ref().map_or(true, Self::should_persist);

        match self.durable.delete(id).await {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(removed.is_some()),
            Err(e) if !persisted => {
                debug!("Ignoring durable delete failure for unpersisted lobby {}: {}", id, e);
                Ok(removed.is_some())
            }
            Err(e) => {
                warn!("❌ Failed to delete lobby {} from durable store: {}", id, e);
                if let Some(lobby) = removed {
                    self.fast.insert(id, lobby);
                }
                Err(e)
            }
        }
    }

    /// The active lobby containing `player_id`, from the fast tier only.
    pub fn find_by_player(&self, player_id: PlayerId) -> Option<Lobby> {
        self.fast
            .iter()
            .find(|entry| entry.has_player(player_id))
            .map(|entry| entry.value().clone())
    }

    /// Every lobby in the fast tier, oldest first.
    pub fn list_active(&self) -> Vec<Lobby> {
        let mut lobbies: Vec<Lobby> = self.fast.iter().map(|e| e.value().clone()).collect();
        lobbies.sort_by_key(|l| (l.created_at, l.id));
        lobbies
    }

    /// Drops a lobby from the fast tier only; the durable copy stays.
    pub fn evict(&self, id: LobbyId) -> Option<Lobby> {
        self.fast.remove(&id).map(|(_, lobby)| lobby)
    }

    /// Warms the fast tier from the durable tier, returning how many lobbies
    /// were loaded.
    pub async fn load_persisted(&self) -> Result<usize, StoreError> {
        let lobbies = self.durable.find_active().await?;
        let count = lobbies.len();
        for lobby in lobbies {
            self.fast.insert(lobby.id, lobby);
        }
        info!("📂 Loaded {} persisted lobbies", count);
        Ok(count)
    }

    /// Number of lobbies in the fast tier.
    pub fn len(&self) -> usize {
        self.fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty()
    }
}
