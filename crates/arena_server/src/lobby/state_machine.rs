//! Guarded lifecycle of a lobby.
//!
//! ```text
//! Open ──join──► Waiting ──ready──► Ready ──start──► Starting
//!   │               │                 ▲ │               ▲
//!   └─join(n==max)─►└──join(n==max)─► Full ───start─────┘
//!                                     (leave from Full returns to Ready)
//! ```
//!
//! The machine owns the roster: guards are evaluated against the player
//! count the trigger would produce, and a rejected trigger leaves both the
//! status and the roster untouched.

use arena_event_system::{LobbyStatus, PlayerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Input to the lobby state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", content = "player_id", rename_all = "snake_case")]
pub enum LobbyTrigger {
    PlayerJoined(PlayerId),
    PlayerLeft(PlayerId),
    ReadySet,
    GameStarted,
}

impl LobbyTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            LobbyTrigger::PlayerJoined(_) => "player_joined",
            LobbyTrigger::PlayerLeft(_) => "player_left",
            LobbyTrigger::ReadySet => "ready_set",
            LobbyTrigger::GameStarted => "game_started",
        }
    }
}

impl fmt::Display for LobbyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LobbyTrigger::PlayerJoined(player) | LobbyTrigger::PlayerLeft(player) => {
                write!(f, "{}({})", self.name(), player)
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// A transition the machine performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: LobbyStatus,
    pub to: LobbyStatus,
    pub trigger: LobbyTrigger,
    /// Player count after the transition
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot apply {trigger} to a {from} lobby with {player_count} player(s)")]
    InvalidTransition {
        from: LobbyStatus,
        trigger: LobbyTrigger,
        player_count: usize,
    },
}

/// State machine for one lobby.
#[derive(Debug, Clone)]
pub struct LobbyStateMachine {
    status: LobbyStatus,
    players: Vec<PlayerId>,
    max_players: usize,
    history: Vec<Transition>,
}

impl LobbyStateMachine {
    /// A fresh lobby: `Open`, with its owner as the only player.
    pub fn new(owner: PlayerId, max_players: usize) -> Self {
        Self::restore(LobbyStatus::Open, vec![owner], max_players)
    }

    /// Resumes a machine from a stored status and roster.
    pub fn restore(status: LobbyStatus, players: Vec<PlayerId>, max_players: usize) -> Self {
        Self {
            status,
            players,
            max_players,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> LobbyStatus {
        self.status
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Transitions performed since this machine was created or restored.
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// True only in `Ready` and `Full`.
    pub fn can_start_game(&self) -> bool {
        matches!(self.status, LobbyStatus::Ready | LobbyStatus::Full)
    }

    /// The status `trigger` would lead to, or `None` if no rule matches.
    ///
    /// Pure: the machine is not modified.
    pub fn target(&self, trigger: &LobbyTrigger) -> Option<LobbyStatus> {
        use LobbyStatus::*;

        let n = match trigger {
            LobbyTrigger::PlayerJoined(player) => {
                if self.players.contains(player) {
                    return None;
                }
                self.players.len() + 1
            }
            LobbyTrigger::PlayerLeft(player) => {
                if !self.players.contains(player) {
                    return None;
                }
                self.players.len() - 1
            }
            LobbyTrigger::ReadySet | LobbyTrigger::GameStarted => self.players.len(),
        };
        let max = self.max_players;
        let below_max = n >= 2 && n < max;

        match (self.status, trigger) {
            (Open, LobbyTrigger::PlayerJoined(_)) if below_max => Some(Waiting),
            (Open, LobbyTrigger::PlayerJoined(_)) if n == max => Some(Full),
            (Open, LobbyTrigger::PlayerLeft(_)) if n == 0 => Some(Open),

            (Waiting, LobbyTrigger::PlayerJoined(_)) if below_max => Some(Waiting),
            (Waiting, LobbyTrigger::PlayerJoined(_)) if n == max => Some(Full),
            (Waiting, LobbyTrigger::PlayerLeft(_)) if n <= 1 => Some(Open),
            (Waiting, LobbyTrigger::PlayerLeft(_)) if below_max => Some(Waiting),
            (Waiting, LobbyTrigger::ReadySet) => Some(Ready),

            (Ready, LobbyTrigger::PlayerLeft(_)) if n < 2 => Some(Waiting),
            (Ready, LobbyTrigger::PlayerLeft(_)) if below_max => Some(Ready),
            (Ready, LobbyTrigger::PlayerJoined(_)) if n == max => Some(Full),
            (Ready, LobbyTrigger::PlayerJoined(_)) if below_max => Some(Ready),
            (Ready, LobbyTrigger::GameStarted) => Some(Starting),

            (Full, LobbyTrigger::PlayerLeft(_)) if n < max => Some(Ready),
            (Full, LobbyTrigger::GameStarted) => Some(Starting),

            _ => None,
        }
    }

    /// Applies `trigger`, updating status and roster.
    ///
    /// # Errors
    ///
    /// [`TransitionError::InvalidTransition`] when no rule matches, including
    /// a duplicate join or the departure of an unknown player. The machine is
    /// unchanged in that case.
    pub fn fire(&mut self, trigger: LobbyTrigger) -> Result<Transition, TransitionError> {
        let to = self
            .target(&trigger)
            .ok_or(TransitionError::InvalidTransition {
                from: self.status,
                trigger,
                player_count: self.players.len(),
            })?;

        match trigger {
            LobbyTrigger::PlayerJoined(player) => self.players.push(player),
            LobbyTrigger::PlayerLeft(player) => self.players.retain(|p| *p != player),
            LobbyTrigger::ReadySet | LobbyTrigger::GameStarted => {}
        }

        let transition = Transition {
            from: self.status,
            to,
            trigger,
            player_count: self.players.len(),
        };
        self.status = to;

        info!(
            "🔀 Lobby {} -> {} on {} ({} player(s))",
            transition.from, transition.to, transition.trigger, transition.player_count
        );
        self.history.push(transition.clone());
        Ok(transition)
    }
}
