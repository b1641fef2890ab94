use super::lobby_bridge::lobby_channel;
use super::module_bridge::ModuleBridge;
use crate::events::{DomainEvent, EventEnvelope};

/// Channel carrying every event of one game session.
pub fn game_channel(session_id: impl std::fmt::Display) -> String {
    format!("game.{session_id}")
}

/// Bridge for the `game` module.
///
/// Session events go to `game.<session>`. `game.started` is also sent to the
/// originating lobby's channel so lobby members learn the session id.
#[derive(Debug, Default, Clone)]
pub struct GameBridge;

impl GameBridge {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleBridge for GameBridge {
    fn module_name(&self) -> &str {
        "game"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn channels(&self, event: &EventEnvelope) -> Vec<String> {
        let payload = event.payload();
        let mut channels = Vec::new();
        if let Some(session_id) = payload.session_id() {
            channels.push(game_channel(session_id));
        }
        if let DomainEvent::GameStarted { lobby_id, .. } = payload {
            channels.push(lobby_channel(lobby_id));
        }
        channels
    }
}
