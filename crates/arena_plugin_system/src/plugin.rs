use crate::error::GameError;
use crate::state::{ActionValidation, GameAction, GameState};
use arena_event_system::PlayerId;
use serde_json::Value;

/// A turn-based game the engine can host.
///
/// Plugins are stateless rule books: every method receives the state it works
/// on and [`apply_action`](GamePlugin::apply_action) returns a new state
/// instead of mutating its input. This lets the engine validate, apply and
/// commit a move as one step.
///
/// # Examples
///
/// ```rust
/// use arena_event_system::PlayerId;
/// use arena_plugin_system::{GameAction, GamePlugin, TicTacToe};
///
/// let players = [PlayerId::new(), PlayerId::new()];
/// let game = TicTacToe::new();
/// let state = game.initialize(&players, &serde_json::Value::Null).unwrap();
///
/// let action = GameAction::new("place", serde_json::json!({"row": 1, "col": 1}));
/// assert!(game.validate_action(&state, players[0], &action).valid);
///
/// let next = game.apply_action(&state, players[0], &action).unwrap();
/// assert_eq!(next.current_player_index, 1);
/// assert_eq!(state.turn_number, 0);
/// ```
pub trait GamePlugin: Send + Sync {
    /// Stable game type identifier, e.g. `tic_tac_toe`.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str {
        self.id()
    }

    fn min_players(&self) -> usize;

    fn max_players(&self) -> usize;

    /// Builds the opening state for `player_ids`, in turn order.
    fn initialize(&self, player_ids: &[PlayerId], config: &Value) -> Result<GameState, GameError>;

    /// Checks whether `player_id` may perform `action` on `state`.
    fn validate_action(
        &self,
        state: &GameState,
        player_id: PlayerId,
        action: &GameAction,
    ) -> ActionValidation;

    /// Returns the state after `action`, advancing `current_player_index`
    /// and `turn_number`. Callers validate first.
    fn apply_action(
        &self,
        state: &GameState,
        player_id: PlayerId,
        action: &GameAction,
    ) -> Result<GameState, GameError>;

    fn is_finished(&self, state: &GameState) -> bool;

    /// Winner of a finished game; `None` while running or on a draw.
    fn get_winner(&self, state: &GameState) -> Option<PlayerId>;
}
