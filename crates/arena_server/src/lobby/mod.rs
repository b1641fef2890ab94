//! Lobby model, lifecycle and storage.

mod file_store;
mod locks;
mod memory_store;
mod model;
mod state_machine;
mod store;

pub use file_store::JsonFileLobbyStore;
pub use locks::LobbyLocks;
pub use memory_store::InMemoryDurableStore;
pub use model::Lobby;
pub use state_machine::{LobbyStateMachine, LobbyTrigger, Transition, TransitionError};
pub use store::{DurableLobbyStore, HybridLobbyStore};

use crate::config::{StorageBackend, StorageSettings};
use crate::error::StoreError;
use std::sync::Arc;

/// Builds the durable store selected in the configuration.
pub async fn open_durable_store(
    settings: &StorageSettings,
) -> Result<Arc<dyn DurableLobbyStore>, StoreError> {
    let store: Arc<dyn DurableLobbyStore> = match settings.backend {
        StorageBackend::Memory => Arc::new(InMemoryDurableStore::new()),
        StorageBackend::Json => Arc::new(JsonFileLobbyStore::open(&settings.directory).await?),
    };
    Ok(store)
}
