use super::module_bridge::ModuleBridge;
use crate::events::{DomainEvent, EventEnvelope};

/// Envelope tag marking events of a private lobby. Such events never reach
/// the global lobby list.
pub const PRIVATE_LOBBY_TAG: &str = "lobby.private";

/// Global channel listing public lobbies.
pub const LOBBY_LIST_CHANNEL: &str = "lobbies";

/// Channel carrying every event of one lobby.
pub fn lobby_channel(lobby_id: impl std::fmt::Display) -> String {
    format!("lobby.{lobby_id}")
}

/// Bridge for the `lobby` module.
///
/// Every lobby event goes to `lobby.<id>`. Lifecycle and player count
/// changes of public lobbies are also mirrored to [`LOBBY_LIST_CHANNEL`].
#[derive(Debug, Default, Clone)]
pub struct LobbyBridge;

impl LobbyBridge {
    pub fn new() -> Self {
        Self
    }

    fn is_list_update(event: &DomainEvent) -> bool {
        matches!(
            event,
            DomainEvent::LobbyCreated { .. }
                | DomainEvent::LobbyStatusChanged { .. }
                | DomainEvent::LobbyDeleted { .. }
                | DomainEvent::PlayerJoined { .. }
                | DomainEvent::PlayerLeft { .. }
                | DomainEvent::PlayerKicked { .. }
        )
    }
}

impl ModuleBridge for LobbyBridge {
    fn module_name(&self) -> &str {
        "lobby"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn channels(&self, event: &EventEnvelope) -> Vec<String> {
        let payload = event.payload();
        let Some(lobby_id) = payload.lobby_id() else {
            return Vec::new();
        };

        let mut channels = vec![lobby_channel(lobby_id)];
        let is_private = event.has_tag(PRIVATE_LOBBY_TAG)
            || matches!(payload, DomainEvent::LobbyCreated { is_private: true, .. });
        if !is_private && Self::is_list_update(payload) {
            channels.push(LOBBY_LIST_CHANNEL.to_string());
        }
        channels
    }
}
