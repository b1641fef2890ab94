use super::model::Lobby;
use super::store::DurableLobbyStore;
use crate::error::StoreError;
use arena_event_system::LobbyId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Durable store kept in process memory.
///
/// Counts every access so callers can observe how often the durable tier is
/// hit, and can be switched unavailable to exercise failure paths.
#[derive(Debug)]
pub struct InMemoryDurableStore {
    lobbies: DashMap<LobbyId, Lobby>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    available: AtomicBool,
}

impl Default for InMemoryDurableStore {
    fn default() -> Self {
        Self {
            lobbies: DashMap::new(),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Inspects the stored set without counting a read.
    pub fn contains(&self, id: LobbyId) -> bool {
        self.lobbies.contains_key(&id)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store switched off".to_string()))
        }
    }
}

#[async_trait]
impl DurableLobbyStore for InMemoryDurableStore {
    async fn save(&self, lobby: &Lobby) -> Result<(), StoreError> {
        self.check_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lobbies.insert(lobby.id, lobby.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: LobbyId) -> Result<Option<Lobby>, StoreError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lobbies.get(&id).map(|l| l.value().clone()))
    }

    async fn delete(&self, id: LobbyId) -> Result<(), StoreError> {
        self.check_available()?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.lobbies
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_active(&self) -> Result<Vec<Lobby>, StoreError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lobbies.iter().map(|l| l.value().clone()).collect())
    }
}
