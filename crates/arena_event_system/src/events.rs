//! # Domain Events and Envelopes
//!
//! Every event on the bus is an [`EventEnvelope`]: an immutable value that
//! carries identity (`id`), causality (`correlation_id`, `parent_id`),
//! delivery metadata (`retry_count`, `tags`) and a strongly typed
//! [`DomainEvent`] payload.
//!
//! ## Event Types
//!
//! Event types are dot-namespaced strings. The first segment is the *module*
//! (`lobby`, `game`, ...) and is what module bridges route on:
//!
//! - `lobby.created`, `lobby.deleted`
//! - `lobby.player.joined`, `lobby.player.left`, `lobby.player.kicked`
//! - `lobby.status.changed`
//! - `game.started`, `game.action.applied`, `game.finished`
//!
//! Custom events may use any other well-formed type through
//! [`EventEnvelope::custom`].
//!
//! ## Retries
//!
//! A retry never mutates an envelope. [`EventEnvelope::retry`] produces a new
//! envelope with a regenerated id, `retry_count + 1`, and the same correlation
//! id, so every attempt stays traceable to the original cause.

use crate::error::EventError;
use crate::types::{EventId, LobbyId, LobbyStatus, PlayerId, SessionId};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Event types of every built-in [`DomainEvent`] variant.
pub const BUILTIN_EVENT_TYPES: [&str; 9] = [
    "lobby.created",
    "lobby.player.joined",
    "lobby.player.left",
    "lobby.player.kicked",
    "lobby.status.changed",
    "lobby.deleted",
    "game.started",
    "game.action.applied",
    "game.finished",
];

/// Typed payload of a domain event.
///
/// Serialized with an internal `kind` tag so the transport payload stays
/// flat. Each variant maps to exactly one event type, see
/// [`DomainEvent::event_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A lobby was created by its owner.
    LobbyCreated {
        lobby_id: LobbyId,
        name: String,
        owner_id: PlayerId,
        max_players: usize,
        is_private: bool,
    },
    /// A player joined a lobby.
    PlayerJoined {
        lobby_id: LobbyId,
        player_id: PlayerId,
        player_count: usize,
    },
    /// A player left a lobby voluntarily.
    PlayerLeft {
        lobby_id: LobbyId,
        player_id: PlayerId,
        player_count: usize,
    },
    /// A player was removed by the lobby owner.
    PlayerKicked {
        lobby_id: LobbyId,
        player_id: PlayerId,
        kicked_by: PlayerId,
    },
    /// The lobby state machine performed a transition.
    LobbyStatusChanged {
        lobby_id: LobbyId,
        from: LobbyStatus,
        to: LobbyStatus,
        trigger: String,
        player_count: usize,
    },
    /// The lobby was removed because its last player left.
    LobbyDeleted { lobby_id: LobbyId },
    /// A game session was created for a lobby that reached `Starting`.
    GameStarted {
        lobby_id: LobbyId,
        session_id: SessionId,
        game_type: String,
        player_ids: Vec<PlayerId>,
    },
    /// A player action was validated and applied.
    GameActionApplied {
        session_id: SessionId,
        player_id: PlayerId,
        action: serde_json::Value,
        turn_number: u32,
    },
    /// A game session reached a terminal position. `winner_id` is `None` on a draw.
    GameFinished {
        session_id: SessionId,
        winner_id: Option<PlayerId>,
    },
    /// An event outside the built-in vocabulary.
    Custom {
        event_type: String,
        data: serde_json::Value,
    },
}

impl DomainEvent {
    /// Returns the dot-namespaced event type for this payload.
    pub fn event_type(&self) -> &str {
        match self {
            DomainEvent::LobbyCreated { .. } => "lobby.created",
            DomainEvent::PlayerJoined { .. } => "lobby.player.joined",
            DomainEvent::PlayerLeft { .. } => "lobby.player.left",
            DomainEvent::PlayerKicked { .. } => "lobby.player.kicked",
            DomainEvent::LobbyStatusChanged { .. } => "lobby.status.changed",
            DomainEvent::LobbyDeleted { .. } => "lobby.deleted",
            DomainEvent::GameStarted { .. } => "game.started",
            DomainEvent::GameActionApplied { .. } => "game.action.applied",
            DomainEvent::GameFinished { .. } => "game.finished",
            DomainEvent::Custom { event_type, .. } => event_type,
        }
    }

    /// Returns the lobby this event relates to, if any.
    pub fn lobby_id(&self) -> Option<LobbyId> {
        match self {
            DomainEvent::LobbyCreated { lobby_id, .. }
            | DomainEvent::PlayerJoined { lobby_id, .. }
            | DomainEvent::PlayerLeft { lobby_id, .. }
            | DomainEvent::PlayerKicked { lobby_id, .. }
            | DomainEvent::LobbyStatusChanged { lobby_id, .. }
            | DomainEvent::LobbyDeleted { lobby_id }
            | DomainEvent::GameStarted { lobby_id, .. } => Some(*lobby_id),
            _ => None,
        }
    }

    /// Returns the game session this event relates to, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            DomainEvent::GameStarted { session_id, .. }
            | DomainEvent::GameActionApplied { session_id, .. }
            | DomainEvent::GameFinished { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }
}

/// Validates a dot-namespaced event type such as `lobby.player.joined`.
///
/// At least two segments are required; each segment must be non-empty and
/// consist of lowercase ASCII letters, digits or underscores.
pub fn validate_event_type(event_type: &str) -> Result<(), EventError> {
    let mut segments = 0;
    for segment in event_type.split('.') {
        let well_formed = !segment.is_empty()
            && segment
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if !well_formed {
            return Err(EventError::InvalidEventType(event_type.to_string()));
        }
        segments += 1;
    }

    if segments < 2 {
        return Err(EventError::InvalidEventType(event_type.to_string()));
    }
    Ok(())
}

/// Immutable event value published on the [`crate::EventBus`].
///
/// Fields are private; builder methods consume `self` and return a new value,
/// so an envelope cannot change once it has been handed to the bus.
///
/// # Examples
///
/// ```rust
/// use arena_event_system::{DomainEvent, EventEnvelope, LobbyId};
///
/// let envelope = EventEnvelope::new(DomainEvent::LobbyDeleted { lobby_id: LobbyId::new() })
///     .with_tag("cleanup");
///
/// assert_eq!(envelope.event_type(), "lobby.deleted");
/// assert_eq!(envelope.correlation_id(), envelope.id());
///
/// let retried = envelope.retry();
/// assert_ne!(retried.id(), envelope.id());
/// assert_eq!(retried.correlation_id(), envelope.correlation_id());
/// assert_eq!(retried.retry_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    id: EventId,
    event_type: String,
    payload: DomainEvent,
    timestamp: u64,
    correlation_id: EventId,
    parent_id: Option<EventId>,
    retry_count: u32,
    tags: BTreeSet<String>,
}

impl EventEnvelope {
    /// Wraps a built-in domain payload. The correlation id defaults to the
    /// envelope's own id.
    pub fn new(payload: DomainEvent) -> Self {
        let id = EventId::new();
        Self {
            id,
            event_type: payload.event_type().to_string(),
            payload,
            timestamp: current_timestamp(),
            correlation_id: id,
            parent_id: None,
            retry_count: 0,
            tags: BTreeSet::new(),
        }
    }

    /// Builds an envelope for an event type outside the built-in vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidEventType`] if `event_type` is not a
    /// well-formed dot-namespaced identifier.
    pub fn custom(
        event_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<Self, EventError> {
        let event_type = event_type.into();
        validate_event_type(&event_type)?;
        Ok(Self::new(DomainEvent::Custom { event_type, data }))
    }

    /// Builds a child envelope caused by `parent`: it shares the parent's
    /// correlation id and records the parent's id as its causation link.
    pub fn caused_by(parent: &EventEnvelope, payload: DomainEvent) -> Self {
        Self::new(payload)
            .with_correlation_id(parent.correlation_id)
            .with_parent_id(parent.id)
    }

    pub fn with_correlation_id(mut self, correlation_id: EventId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_parent_id(mut self, parent_id: EventId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Produces the envelope for the next delivery attempt.
    ///
    /// The copy gets a fresh id and an incremented `retry_count`; payload,
    /// correlation id, parent id, timestamp and tags are kept.
    pub fn retry(&self) -> Self {
        Self {
            id: EventId::new(),
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &DomainEvent {
        &self.payload
    }

    /// Milliseconds since the Unix epoch at construction time.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn correlation_id(&self) -> EventId {
        self.correlation_id
    }

    pub fn parent_id(&self) -> Option<EventId> {
        self.parent_id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// The module prefix of the event type (`lobby` for `lobby.player.joined`).
    pub fn module(&self) -> &str {
        self.event_type
            .split_once('.')
            .map(|(module, _)| module)
            .unwrap_or(&self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined() -> DomainEvent {
        DomainEvent::PlayerJoined {
            lobby_id: LobbyId::new(),
            player_id: PlayerId::new(),
            player_count: 2,
        }
    }

    #[test]
    fn test_new_envelope_defaults() {
        let envelope = EventEnvelope::new(joined());
        assert_eq!(envelope.event_type(), "lobby.player.joined");
        assert_eq!(envelope.module(), "lobby");
        assert_eq!(envelope.correlation_id(), envelope.id());
        assert_eq!(envelope.parent_id(), None);
        assert_eq!(envelope.retry_count(), 0);
        assert!(envelope.tags().is_empty());
    }

    #[test]
    fn test_retry_regenerates_id_and_keeps_correlation() {
        let original = EventEnvelope::new(joined()).with_tag("audit");
        let first = original.retry();
        let second = first.retry();

        assert_ne!(first.id(), original.id());
        assert_ne!(second.id(), first.id());
        assert_eq!(second.retry_count(), 2);
        assert_eq!(second.correlation_id(), original.correlation_id());
        assert_eq!(second.payload(), original.payload());
        assert!(second.has_tag("audit"));
        // the original is untouched
        assert_eq!(original.retry_count(), 0);
    }

    #[test]
    fn test_caused_by_links_parent() {
        let parent = EventEnvelope::new(joined());
        let child = EventEnvelope::caused_by(
            &parent,
            DomainEvent::LobbyDeleted {
                lobby_id: LobbyId::new(),
            },
        );

        assert_eq!(child.parent_id(), Some(parent.id()));
        assert_eq!(child.correlation_id(), parent.correlation_id());
        assert_ne!(child.id(), parent.id());
    }

    #[test]
    fn test_custom_event_type_validation() {
        assert!(EventEnvelope::custom("chat.message.sent", serde_json::json!({})).is_ok());
        assert!(EventEnvelope::custom("test.event_2", serde_json::Value::Null).is_ok());

        for bad in ["", "chat", "chat.", ".chat", "chat..sent", "Chat.Sent", "chat.sent!"] {
            let result = EventEnvelope::custom(bad, serde_json::Value::Null);
            assert!(
                matches!(result, Err(EventError::InvalidEventType(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_custom_module_prefix() {
        let envelope = EventEnvelope::custom("chat.message", serde_json::json!({"text": "hi"})).unwrap();
        assert_eq!(envelope.module(), "chat");
        assert_eq!(envelope.event_type(), "chat.message");
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let session_id = SessionId::new();
        let value = serde_json::to_value(DomainEvent::GameFinished {
            session_id,
            winner_id: None,
        })
        .unwrap();

        assert_eq!(value["kind"], "game_finished");
        assert_eq!(value["session_id"], session_id.to_string());
        assert!(value["winner_id"].is_null());
    }
}
