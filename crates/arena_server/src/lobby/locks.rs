use arena_event_system::LobbyId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-lobby async mutexes.
///
/// Every command that reads, transitions and saves a lobby holds that
/// lobby's guard for the whole sequence, so two commands on one lobby never
/// interleave while commands on different lobbies run in parallel.
#[derive(Debug, Default)]
pub struct LobbyLocks {
    locks: DashMap<LobbyId, Arc<Mutex<()>>>,
}

impl LobbyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn acquire(&self, id: LobbyId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        lock.lock_owned().await
    }

    /// Forgets the mutex of a deleted lobby.
    pub fn remove(&self, id: LobbyId) {
        self.locks.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
