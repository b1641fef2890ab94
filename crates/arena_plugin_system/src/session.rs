use crate::state::GameState;
use arena_event_system::{current_timestamp, LobbyId, PlayerId, SessionId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    InProgress,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled sessions never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One running (or finished) game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub game_type: String,
    pub lobby_id: Option<LobbyId>,
    /// Players in turn order; fixed for the session's lifetime
    pub player_ids: Vec<PlayerId>,
    pub state: GameState,
    pub status: SessionStatus,
    pub winner_id: Option<PlayerId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl GameSession {
    pub(crate) fn new(
        game_type: &str,
        lobby_id: Option<LobbyId>,
        player_ids: Vec<PlayerId>,
        state: GameState,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: SessionId::new(),
            game_type: game_type.to_string(),
            lobby_id,
            player_ids,
            state,
            status: SessionStatus::Created,
            winner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The player expected to move next.
    pub fn current_player(&self) -> Option<PlayerId> {
        self.player_ids.get(self.state.current_player_index).copied()
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.player_ids.contains(&player_id)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = current_timestamp();
    }
}
