//! # Core Identifier and Status Types
//!
//! Identifier newtypes shared by every Arena crate, plus the lobby lifecycle
//! status that travels inside domain events. Keeping them here lets the event
//! payloads stay strongly typed without the event crate depending on the
//! lobby or game crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random identifier using UUID v4.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses an identifier from its hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a player.
    ///
    /// This is a wrapper around UUID that provides type safety and ensures
    /// player IDs cannot be confused with lobby or session IDs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_event_system::PlayerId;
    ///
    /// let player_id = PlayerId::new();
    /// let parsed: PlayerId = player_id.to_string().parse().unwrap();
    /// assert_eq!(player_id, parsed);
    /// ```
    PlayerId
);

uuid_id!(
    /// Unique identifier for a lobby.
    LobbyId
);

uuid_id!(
    /// Unique identifier for a game session.
    SessionId
);

uuid_id!(
    /// Unique identifier of a single event envelope. Regenerated on retry.
    EventId
);

/// Lifecycle status of a lobby.
///
/// `Starting` is terminal: once reached the lobby is handed over to the game
/// engine and no further lobby-level transitions occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    /// One player present, waiting for anybody to join
    Open,
    /// Two or more players, not yet marked ready
    Waiting,
    /// Marked ready by the owner, can be started
    Ready,
    /// At capacity, can be started
    Full,
    /// Handed to the game engine (terminal)
    Starting,
}

impl LobbyStatus {
    /// Returns the stable lowercase name used in logs and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            LobbyStatus::Open => "open",
            LobbyStatus::Waiting => "waiting",
            LobbyStatus::Ready => "ready",
            LobbyStatus::Full => "full",
            LobbyStatus::Starting => "starting",
        }
    }

    /// Whether this status is the terminal state of the lobby lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LobbyStatus::Starting)
    }
}

impl std::fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
