//! Three-in-a-row on a 3×3 board.
//!
//! The first player plays `X`, the second `O`. Actions have the shape
//! `{"kind": "place", "payload": {"row": 0..=2, "col": 0..=2}}`.

use crate::error::GameError;
use crate::plugin::GamePlugin;
use crate::state::{ActionValidation, GameAction, GameState};
use arena_event_system::PlayerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TIC_TAC_TOE: &str = "tic_tac_toe";

const LINES: [[(usize, usize); 3]; 8] = [
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Mark {
    X,
    O,
}

/// Typed view of the opaque state blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Board {
    cells: [[Option<Mark>; 3]; 3],
    /// `players[0]` plays X
    players: [PlayerId; 2],
}

impl Board {
    fn decode(state: &GameState) -> Result<Self, GameError> {
        serde_json::from_value(state.data.clone())
            .map_err(|e| GameError::CorruptState(e.to_string()))
    }

    fn encode(&self) -> Result<Value, GameError> {
        serde_json::to_value(self).map_err(|e| GameError::CorruptState(e.to_string()))
    }

    fn mark_of(&self, player_id: PlayerId) -> Option<Mark> {
        if self.players[0] == player_id {
            Some(Mark::X)
        } else if self.players[1] == player_id {
            Some(Mark::O)
        } else {
            None
        }
    }

    fn winning_mark(&self) -> Option<Mark> {
        LINES.iter().find_map(|line| {
            let [a, b, c] = line.map(|(row, col)| self.cells[row][col]);
            match (a, b, c) {
                (Some(a), Some(b), Some(c)) if a == b && b == c => Some(a),
                _ => None,
            }
        })
    }

    fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }
}

#[derive(Debug, Deserialize)]
struct Placement {
    row: usize,
    col: usize,
}

/// The reference game plugin.
#[derive(Debug, Default, Clone)]
pub struct TicTacToe;

impl TicTacToe {
    pub fn new() -> Self {
        Self
    }

    fn check(
        &self,
        state: &GameState,
        player_id: PlayerId,
        action: &GameAction,
    ) -> Result<(Board, Placement, Mark), String> {
        let board = Board::decode(state).map_err(|e| e.to_string())?;
        if board.winning_mark().is_some() || board.is_full() {
            return Err("game is already finished".to_string());
        }
        if action.kind != "place" {
            return Err(format!("unknown action '{}'", action.kind));
        }
        let mark = board
            .mark_of(player_id)
            .ok_or_else(|| "player is not part of this game".to_string())?;
        if board.players.get(state.current_player_index) != Some(&player_id) {
            return Err("not your turn".to_string());
        }
        let placement: Placement = serde_json::from_value(action.payload.clone())
            .map_err(|_| "payload must be {\"row\": n, \"col\": n}".to_string())?;
        if placement.row > 2 || placement.col > 2 {
            return Err(format!(
                "cell ({}, {}) is off the board",
                placement.row, placement.col
            ));
        }
        if board.cells[placement.row][placement.col].is_some() {
            return Err(format!(
                "cell ({}, {}) is taken",
                placement.row, placement.col
            ));
        }
        Ok((board, placement, mark))
    }
}

impl GamePlugin for TicTacToe {
    fn id(&self) -> &str {
        TIC_TAC_TOE
    }

    fn name(&self) -> &str {
        "Tic-Tac-Toe"
    }

    fn min_players(&self) -> usize {
        2
    }

    fn max_players(&self) -> usize {
        2
    }

    fn initialize(&self, player_ids: &[PlayerId], _config: &Value) -> Result<GameState, GameError> {
        let players: [PlayerId; 2] =
            player_ids
                .try_into()
                .map_err(|_| GameError::InvalidPlayerCount {
                    game_type: TIC_TAC_TOE.to_string(),
                    min: 2,
                    max: 2,
                    actual: player_ids.len(),
                })?;
        let board = Board {
            cells: [[None; 3]; 3],
            players,
        };
        Ok(GameState::new(board.encode()?))
    }

    fn validate_action(
        &self,
        state: &GameState,
        player_id: PlayerId,
        action: &GameAction,
    ) -> ActionValidation {
        match self.check(state, player_id, action) {
            Ok(_) => ActionValidation::ok(),
            Err(reason) => ActionValidation::reject(reason),
        }
    }

    fn apply_action(
        &self,
        state: &GameState,
        player_id: PlayerId,
        action: &GameAction,
    ) -> Result<GameState, GameError> {
        let (mut board, placement, mark) = self
            .check(state, player_id, action)
            .map_err(GameError::InvalidAction)?;
        board.cells[placement.row][placement.col] = Some(mark);

        Ok(GameState {
            data: board.encode()?,
            current_player_index: (state.current_player_index + 1) % 2,
            turn_number: state.turn_number + 1,
        })
    }

    fn is_finished(&self, state: &GameState) -> bool {
        Board::decode(state)
            .map(|board| board.winning_mark().is_some() || board.is_full())
            .unwrap_or(false)
    }

    fn get_winner(&self, state: &GameState) -> Option<PlayerId> {
        let board = Board::decode(state).ok()?;
        match board.winning_mark()? {
            Mark::X => Some(board.players[0]),
            Mark::O => Some(board.players[1]),
        }
    }
}
