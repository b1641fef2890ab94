//! JSON file lobby storage

use super::model::Lobby;
use super::store::DurableLobbyStore;
use crate::error::StoreError;
use arena_event_system::LobbyId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument};

const FILE_SUFFIX: &str = ".lobby.json";

/// Durable store writing one JSON file per lobby.
///
/// Writes go to a temporary file that is synced and then renamed over the
/// target, so a crash never leaves a half-written lobby behind.
#[derive(Debug)]
pub struct JsonFileLobbyStore {
    directory: PathBuf,
}

impl JsonFileLobbyStore {
    /// Opens (and creates if needed) the storage directory.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        tokio_fs::create_dir_all(&directory)
            .await
            .map_err(|e| StoreError::DirectoryRead(directory.clone(), e))?;
        info!("📁 Lobby store at {}", directory.display());
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn lobby_path(&self, id: LobbyId) -> PathBuf {
        self.directory.join(format!("{id}{FILE_SUFFIX}"))
    }

    async fn load_file(&self, path: &Path) -> Result<Lobby, StoreError> {
        let contents = tokio_fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::FileRead(path.to_path_buf(), e))?;
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Deserialization(path.to_path_buf(), e))
    }
}

#[async_trait]
impl DurableLobbyStore for JsonFileLobbyStore {
    #[instrument(skip(self, lobby), fields(lobby_id = %lobby.id))]
    async fn save(&self, lobby: &Lobby) -> Result<(), StoreError> {
        let path = self.lobby_path(lobby.id);
        let temp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(lobby)
            .map_err(|e| StoreError::Serialization(lobby.id, e))?;

        let mut file = tokio_fs::File::create(&temp_path)
            .await
            .map_err(|e| StoreError::FileWrite(temp_path.clone(), e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StoreError::FileWrite(temp_path.clone(), e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::FileWrite(temp_path.clone(), e))?;

        // Atomic rename
        tokio_fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StoreError::FileRename(temp_path, path.clone(), e))?;

        debug!("Saved lobby: {}", lobby.id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: LobbyId) -> Result<Option<Lobby>, StoreError> {
        let path = self.lobby_path(id);
        match tokio_fs::try_exists(&path).await {
            Ok(true) => self.load_file(&path).await.map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(StoreError::FileRead(path, e)),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: LobbyId) -> Result<(), StoreError> {
        let path = self.lobby_path(id);
        match tokio_fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted lobby: {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(StoreError::FileDelete(path, e)),
        }
    }

    #[instrument(skip(self))]
    async fn find_active(&self) -> Result<Vec<Lobby>, StoreError> {
        let mut lobbies = Vec::new();
        let mut entries = tokio_fs::read_dir(&self.directory)
            .await
            .map_err(|e| StoreError::DirectoryRead(self.directory.clone(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::DirectoryRead(self.directory.clone(), e))?
        {
            let path = entry.path();
            let is_lobby_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(FILE_SUFFIX));
            if !is_lobby_file {
                continue;
            }

            match self.load_file(&path).await {
                Ok(lobby) => lobbies.push(lobby),
                Err(e) => {
                    error!("Failed to load lobby from {}: {}", path.display(), e);
                    continue;
                }
            }
        }

        Ok(lobbies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_event_system::{LobbyStatus, PlayerId};

    fn starting_lobby() -> Lobby {
        let mut lobby = Lobby::new("ranked", PlayerId::new(), "tic_tac_toe", 2, 2, true);
        lobby.players.push(PlayerId::new());
        lobby.status = LobbyStatus::Starting;
        lobby
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLobbyStore::open(dir.path()).await.unwrap();
        let lobby = starting_lobby();

        store.save(&lobby).await.unwrap();
        assert_eq!(store.find_by_id(lobby.id).await.unwrap(), Some(lobby.clone()));
        assert_eq!(store.find_by_id(LobbyId::new()).await.unwrap(), None);

        // overwrite leaves no temp file behind
        store.save(&lobby).await.unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}{}", lobby.id, FILE_SUFFIX)]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLobbyStore::open(dir.path()).await.unwrap();
        let lobby = starting_lobby();
        store.save(&lobby).await.unwrap();

        store.delete(lobby.id).await.unwrap();
        assert!(matches!(
            store.delete(lobby.id).await,
            Err(StoreError::NotFound(id)) if id == lobby.id
        ));
    }

    #[tokio::test]
    async fn test_find_active_skips_foreign_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLobbyStore::open(dir.path().join("nested")).await.unwrap();
        store.save(&starting_lobby()).await.unwrap();
        store.save(&starting_lobby()).await.unwrap();

        std::fs::write(store.directory().join("notes.txt"), "hello").unwrap();
        std::fs::write(
            store.directory().join(format!("{}{}", LobbyId::new(), FILE_SUFFIX)),
            "{ not json",
        )
        .unwrap();

        assert_eq!(store.find_active().await.unwrap().len(), 2);
    }
}
