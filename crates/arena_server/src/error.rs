//! Error types for lobby storage and lobby commands.

use crate::lobby::TransitionError;
use arena_event_system::{EventError, LobbyId};
use arena_plugin_system::GameError;
use std::io::Error as IoError;
use std::path::PathBuf;
use thiserror::Error;

/// Lobby storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read directory {0}: {1}")]
    DirectoryRead(PathBuf, IoError),

    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to write file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to rename file from {0} to {1}: {2}")]
    FileRename(PathBuf, PathBuf, IoError),

    #[error("Failed to delete file {0}: {1}")]
    FileDelete(PathBuf, IoError),

    #[error("Failed to serialize lobby {0}: {1}")]
    Serialization(LobbyId, serde_json::Error),

    #[error("Failed to deserialize file {0}: {1}")]
    Deserialization(PathBuf, serde_json::Error),

    #[error("Lobby {0} not found")]
    NotFound(LobbyId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Server startup errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Failure of a lobby command, as reported to the caller.
///
/// Every command failure falls into one of four kinds; [`LobbyError::reason`]
/// is the single human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    /// The request itself is malformed or not permitted
    #[error("validation failed: {0}")]
    Validation(String),
    /// The request is well-formed but conflicts with the current state
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A collaborator failed; the request may succeed when retried
    #[error("temporarily unavailable: {0}")]
    Transient(String),
}

impl LobbyError {
    pub fn validation(reason: impl Into<String>) -> Self {
        LobbyError::Validation(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        LobbyError::Conflict(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        LobbyError::NotFound(reason.into())
    }

    pub fn reason(&self) -> &str {
        match self {
            LobbyError::Validation(reason)
            | LobbyError::Conflict(reason)
            | LobbyError::NotFound(reason)
            | LobbyError::Transient(reason) => reason,
        }
    }

    /// Stable lowercase name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LobbyError::Validation(_) => "validation",
            LobbyError::Conflict(_) => "conflict",
            LobbyError::NotFound(_) => "not_found",
            LobbyError::Transient(_) => "transient",
        }
    }
}

impl From<TransitionError> for LobbyError {
    fn from(error: TransitionError) -> Self {
        LobbyError::Conflict(error.to_string())
    }
}

impl From<StoreError> for LobbyError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => LobbyError::NotFound(format!("lobby {id} does not exist")),
            other => LobbyError::Transient(other.to_string()),
        }
    }
}

impl From<GameError> for LobbyError {
    fn from(error: GameError) -> Self {
        let reason = error.to_string();
        match error {
            GameError::UnknownGameType(_)
            | GameError::InvalidPlayerCount { .. }
            | GameError::InvalidAction(_) => LobbyError::Validation(reason),
            GameError::DuplicateGameType(_) | GameError::SessionNotActive { .. } => {
                LobbyError::Conflict(reason)
            }
            GameError::SessionNotFound(_) => LobbyError::NotFound(reason),
            GameError::CorruptState(_) => LobbyError::Transient(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_event_system::SessionId;

    #[test]
    fn test_store_errors_map_to_transient_except_not_found() {
        let id = LobbyId::new();
        assert!(matches!(
            LobbyError::from(StoreError::NotFound(id)),
            LobbyError::NotFound(_)
        ));
        let transient = LobbyError::from(StoreError::Unavailable("disk full".to_string()));
        assert_eq!(transient.kind(), "transient");
        assert!(transient.reason().contains("disk full"));
    }

    #[test]
    fn test_game_errors_map_per_kind() {
        assert_eq!(
            LobbyError::from(GameError::InvalidAction("cell taken".to_string())).kind(),
            "validation"
        );
        assert_eq!(
            LobbyError::from(GameError::SessionNotFound(SessionId::new())).kind(),
            "not_found"
        );
    }
}
