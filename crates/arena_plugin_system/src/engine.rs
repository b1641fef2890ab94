use crate::error::GameError;
use crate::registry::GamePluginRegistry;
use crate::session::{GameSession, SessionStatus};
use crate::state::GameAction;
use arena_event_system::{LobbyId, PlayerId, SessionId};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successfully applied action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// The session after the action was committed
    pub session: GameSession,
    /// The action ended the game
    pub finished: bool,
}

/// Owns every game session and drives them through their plugins.
///
/// Each session is updated under its map entry lock, so validate, apply and
/// finish detection for one session happen as a single step while other
/// sessions proceed independently.
pub struct GameEngine {
    registry: Arc<GamePluginRegistry>,
    sessions: DashMap<SessionId, GameSession>,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("registry", &self.registry)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl GameEngine {
    pub fn new(registry: Arc<GamePluginRegistry>) -> Self {
        Self {
            registry,
            sessions: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<GamePluginRegistry> {
        &self.registry
    }

    /// Creates and starts a session of `game_type`.
    ///
    /// # Arguments
    ///
    /// * `game_type` - Registered plugin id
    /// * `lobby_id` - Lobby the session was started from, if any
    /// * `player_ids` - Players in turn order
    /// * `config` - Plugin-specific options
    ///
    /// # Errors
    ///
    /// [`GameError::UnknownGameType`] for an unregistered type and
    /// [`GameError::InvalidPlayerCount`] when the players do not fit the
    /// plugin's bounds.
    pub fn start_session(
        &self,
        game_type: &str,
        lobby_id: Option<LobbyId>,
        player_ids: Vec<PlayerId>,
        config: &Value,
    ) -> Result<GameSession, GameError> {
        let plugin = self.registry.get(game_type)?;

        let count = player_ids.len();
        if count < plugin.min_players() || count > plugin.max_players() {
            return Err(GameError::InvalidPlayerCount {
                game_type: game_type.to_string(),
                min: plugin.min_players(),
                max: plugin.max_players(),
                actual: count,
            });
        }

        let state = plugin.initialize(&player_ids, config)?;
        let mut session = GameSession::new(game_type, lobby_id, player_ids, state);
        session.status = SessionStatus::InProgress;

        info!(
            "🎮 Started {} session {} with {} players",
            game_type, session.id, count
        );
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// Validates, applies and commits one action.
    ///
    /// A rejected action leaves the session untouched. When the action ends
    /// the game the session becomes `Completed` and records its winner.
    pub fn apply_action(
        &self,
        session_id: SessionId,
        player_id: PlayerId,
        action: &GameAction,
    ) -> Result<ActionOutcome, GameError> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(GameError::SessionNotFound(session_id))?;
        let session = entry.value_mut();

        if session.status != SessionStatus::InProgress {
            return Err(GameError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }
        if !session.has_player(player_id) {
            return Err(GameError::InvalidAction(format!(
                "player {player_id} is not part of session {session_id}"
            )));
        }

        let plugin = self.registry.get(&session.game_type)?;
        let validation = plugin.validate_action(&session.state, player_id, action);
        if !validation.valid {
            return Err(GameError::InvalidAction(
                validation
                    .error
                    .unwrap_or_else(|| "action rejected".to_string()),
            ));
        }

        session.state = plugin.apply_action(&session.state, player_id, action)?;
        session.touch();

        let finished = plugin.is_finished(&session.state);
        if finished {
            session.status = SessionStatus::Completed;
            session.winner_id = plugin.get_winner(&session.state);
            match session.winner_id {
                Some(winner) => info!("🏆 Session {} won by {}", session_id, winner),
                None => info!("🤝 Session {} ended in a draw", session_id),
            }
        } else {
            debug!(
                "Session {} turn {} applied '{}'",
                session_id, session.state.turn_number, action.kind
            );
        }

        Ok(ActionOutcome {
            session: session.clone(),
            finished,
        })
    }

    pub fn pause(&self, session_id: SessionId) -> Result<GameSession, GameError> {
        self.change_status(session_id, &[SessionStatus::InProgress], SessionStatus::Paused)
    }

    pub fn resume(&self, session_id: SessionId) -> Result<GameSession, GameError> {
        self.change_status(session_id, &[SessionStatus::Paused], SessionStatus::InProgress)
    }

    /// Cancels a session that has not ended yet.
    pub fn cancel(&self, session_id: SessionId) -> Result<GameSession, GameError> {
        self.change_status(
            session_id,
            &[
                SessionStatus::Created,
                SessionStatus::InProgress,
                SessionStatus::Paused,
            ],
            SessionStatus::Cancelled,
        )
    }

    fn change_status(
        &self,
        session_id: SessionId,
        allowed_from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<GameSession, GameError> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(GameError::SessionNotFound(session_id))?;
        let session = entry.value_mut();

        if !allowed_from.contains(&session.status) {
            return Err(GameError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }

        info!("🎮 Session {}: {} -> {}", session_id, session.status, to);
        session.status = to;
        session.touch();
        Ok(session.clone())
    }

    pub fn get_session(&self, session_id: SessionId) -> Option<GameSession> {
        self.sessions.get(&session_id).map(|s| s.value().clone())
    }

    /// Sessions started from `lobby_id`, oldest first.
    pub fn sessions_for_lobby(&self, lobby_id: LobbyId) -> Vec<GameSession> {
        let mut sessions: Vec<GameSession> = self
            .sessions
            .iter()
            .filter(|s| s.lobby_id == Some(lobby_id))
            .map(|s| s.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Number of sessions that have not reached a terminal status.
    pub fn active_session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| !s.status.is_terminal())
            .count()
    }

    /// Drops a session from memory.
    pub fn remove_session(&self, session_id: SessionId) -> Option<GameSession> {
        self.sessions.remove(&session_id).map(|(_, session)| session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tic_tac_toe::TIC_TAC_TOE;
    use serde_json::json;

    fn engine() -> GameEngine {
        GameEngine::new(Arc::new(GamePluginRegistry::with_builtin_games()))
    }

    fn place(row: usize, col: usize) -> GameAction {
        GameAction::new("place", json!({"row": row, "col": col}))
    }

    fn start(engine: &GameEngine) -> (GameSession, PlayerId, PlayerId) {
        let (x, o) = (PlayerId::new(), PlayerId::new());
        let session = engine
            .start_session(TIC_TAC_TOE, Some(LobbyId::new()), vec![x, o], &Value::Null)
            .unwrap();
        (session, x, o)
    }

    #[test]
    fn test_start_session_checks_bounds_and_type() {
        let engine = engine();
        assert!(matches!(
            engine.start_session("chess", None, vec![PlayerId::new(); 2], &Value::Null),
            Err(GameError::UnknownGameType(_))
        ));
        assert!(matches!(
            engine.start_session(
                TIC_TAC_TOE,
                None,
                vec![PlayerId::new(), PlayerId::new(), PlayerId::new()],
                &Value::Null
            ),
            Err(GameError::InvalidPlayerCount { actual: 3, .. })
        ));

        let (session, x, _) = start(&engine);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.current_player(), Some(x));
        assert_eq!(engine.active_session_count(), 1);
    }

    #[test]
    fn test_game_runs_to_completion() {
        let engine = engine();
        let (session, x, o) = start(&engine);

        let moves = [(x, 0, 0), (o, 1, 0), (x, 0, 1), (o, 1, 1)];
        for (player, row, col) in moves {
            let outcome = engine.apply_action(session.id, player, &place(row, col)).unwrap();
            assert!(!outcome.finished);
        }
        let outcome = engine.apply_action(session.id, x, &place(0, 2)).unwrap();

        assert!(outcome.finished);
        assert_eq!(outcome.session.status, SessionStatus::Completed);
        assert_eq!(outcome.session.winner_id, Some(x));
        assert_eq!(engine.active_session_count(), 0);
        assert!(matches!(
            engine.apply_action(session.id, o, &place(2, 2)),
            Err(GameError::SessionNotActive {
                status: SessionStatus::Completed,
                ..
            })
        ));
    }

    #[test]
    fn test_rejected_action_keeps_session() {
        let engine = engine();
        let (session, _, o) = start(&engine);

        let result = engine.apply_action(session.id, o, &place(0, 0));
        assert!(matches!(result, Err(GameError::InvalidAction(_))));
        assert_eq!(engine.get_session(session.id).unwrap().state, session.state);

        let stranger = engine.apply_action(session.id, PlayerId::new(), &place(0, 0));
        assert!(matches!(stranger, Err(GameError::InvalidAction(_))));
    }

    #[test]
    fn test_pause_resume_cancel() {
        let engine = engine();
        let (session, x, _) = start(&engine);

        engine.pause(session.id).unwrap();
        assert!(matches!(
            engine.apply_action(session.id, x, &place(0, 0)),
            Err(GameError::SessionNotActive { .. })
        ));
        assert!(engine.pause(session.id).is_err());

        engine.resume(session.id).unwrap();
        engine.apply_action(session.id, x, &place(0, 0)).unwrap();

        let cancelled = engine.cancel(session.id).unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert!(engine.cancel(session.id).is_err());
        assert!(engine.resume(session.id).is_err());
    }

    #[test]
    fn test_unknown_session() {
        let engine = engine();
        let missing = SessionId::new();
        assert_eq!(
            engine.pause(missing).unwrap_err(),
            GameError::SessionNotFound(missing)
        );
        assert!(engine.get_session(missing).is_none());
    }

    #[test]
    fn test_sessions_for_lobby() {
        let engine = engine();
        let lobby_id = LobbyId::new();
        let players = vec![PlayerId::new(), PlayerId::new()];
        let session = engine
            .start_session(TIC_TAC_TOE, Some(lobby_id), players, &Value::Null)
            .unwrap();
        start(&engine);

        let found = engine.sessions_for_lobby(lobby_id);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, session.id);

        assert!(engine.remove_session(session.id).is_some());
        assert!(engine.sessions_for_lobby(lobby_id).is_empty());
    }
}
