use crate::session::SessionStatus;
use arena_event_system::SessionId;

/// Errors raised by game plugins, the plugin registry and the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Unknown game type: {0}")]
    UnknownGameType(String),
    #[error("Game type already registered: {0}")]
    DuplicateGameType(String),
    #[error("{game_type} needs {min}-{max} players, got {actual}")]
    InvalidPlayerCount {
        game_type: String,
        min: usize,
        max: usize,
        actual: usize,
    },
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Game session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("Game session {session_id} is {status}")]
    SessionNotActive {
        session_id: SessionId,
        status: SessionStatus,
    },
    /// The opaque state blob does not match what the plugin expects
    #[error("Corrupt game state: {0}")]
    CorruptState(String),
}
