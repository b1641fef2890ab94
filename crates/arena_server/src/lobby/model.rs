use super::state_machine::LobbyStateMachine;
use arena_event_system::{current_timestamp, LobbyId, LobbyStatus, PlayerId, SessionId};
use serde::{Deserialize, Serialize};

/// A shared waiting room in which players gather before a game starts.
///
/// `players` is ordered by arrival; the first player is the owner unless
/// ownership was handed over. Status and roster only change through a
/// [`LobbyStateMachine`] (see [`Lobby::state_machine`] and [`Lobby::commit`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    pub owner_id: PlayerId,
    pub game_type: String,
    pub min_players: usize,
    pub max_players: usize,
    pub is_private: bool,
    pub status: LobbyStatus,
    pub players: Vec<PlayerId>,
    /// Game session started from this lobby
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Lobby {
    pub fn new(
        name: impl Into<String>,
        owner_id: PlayerId,
        game_type: impl Into<String>,
        min_players: usize,
        max_players: usize,
        is_private: bool,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: LobbyId::new(),
            name: name.into(),
            owner_id,
            game_type: game_type.into(),
            min_players,
            max_players,
            is_private,
            status: LobbyStatus::Open,
            players: vec![owner_id],
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.contains(&player_id)
    }

    pub fn is_owner(&self, player_id: PlayerId) -> bool {
        self.owner_id == player_id
    }

    /// A machine positioned at this lobby's status and roster.
    pub fn state_machine(&self) -> LobbyStateMachine {
        LobbyStateMachine::restore(self.status, self.players.clone(), self.max_players)
    }

    /// Copies the machine's status and roster back into the lobby.
    ///
    /// If the owner is no longer present, ownership passes to the player who
    /// joined earliest. Returns the new owner when it changed.
    pub fn commit(&mut self, machine: &LobbyStateMachine) -> Option<PlayerId> {
        self.status = machine.status();
        self.players = machine.players().to_vec();
        self.updated_at = current_timestamp();

        if self.has_player(self.owner_id) {
            return None;
        }
        let next = self.players.first().copied()?;
        self.owner_id = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::LobbyTrigger;

    #[test]
    fn test_new_lobby_is_open_with_owner() {
        let owner = PlayerId::new();
        let lobby = Lobby::new("casual", owner, "tic_tac_toe", 2, 4, false);
        assert_eq!(lobby.status, LobbyStatus::Open);
        assert_eq!(lobby.players, vec![owner]);
        assert!(lobby.is_owner(owner));
    }

    #[test]
    fn test_commit_hands_over_ownership() {
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let mut lobby = Lobby::new("casual", owner, "tic_tac_toe", 2, 4, false);

        let mut machine = lobby.state_machine();
        machine.fire(LobbyTrigger::PlayerJoined(guest)).unwrap();
        assert_eq!(lobby.commit(&machine), None);
        assert_eq!(lobby.status, LobbyStatus::Waiting);

        let mut machine = lobby.state_machine();
        machine.fire(LobbyTrigger::PlayerLeft(owner)).unwrap();
        assert_eq!(lobby.commit(&machine), Some(guest));
        assert_eq!(lobby.owner_id, guest);
        assert_eq!(lobby.status, LobbyStatus::Open);
    }
}
