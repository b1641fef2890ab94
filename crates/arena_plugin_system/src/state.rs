use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plugin-owned game state.
///
/// `data` is opaque to everything except the plugin that produced it. The
/// turn bookkeeping lives outside the blob so the engine and clients can read
/// it without knowing the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub data: Value,
    pub current_player_index: usize,
    pub turn_number: u32,
}

impl GameState {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            current_player_index: 0,
            turn_number: 0,
        }
    }
}

/// A move submitted by a player, e.g. `{"kind": "place", "payload": {"row": 0, "col": 2}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl GameAction {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Verdict of [`crate::GamePlugin::validate_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl ActionValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
        }
    }
}
