//! # Lobby Service
//!
//! The command layer of the server. Every command follows the same shape:
//!
//! 1. take the lobby's lock
//! 2. load the lobby (fast tier, then durable tier)
//! 3. drive the state machine
//! 4. save the result
//! 5. publish the domain events describing what happened
//!
//! Event delivery is fire-and-forget: a failing subscriber never undoes a
//! committed command.

use crate::config::LobbySettings;
use crate::error::LobbyError;
use crate::lobby::{HybridLobbyStore, Lobby, LobbyLocks, LobbyTrigger, Transition};
use arena_event_system::{
    DomainEvent, EventBus, EventEnvelope, LobbyId, PlayerId, SessionId, PRIVATE_LOBBY_TAG,
};
use arena_plugin_system::{ActionOutcome, GameAction, GameEngine, GameSession};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest lobby name accepted, in characters.
pub const MAX_LOBBY_NAME_LEN: usize = 64;

/// Parameters of [`LobbyService::create_lobby`].
///
/// Unset fields fall back to [`LobbySettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateLobbyRequest {
    pub name: String,
    #[serde(default)]
    pub min_players: Option<usize>,
    #[serde(default)]
    pub max_players: Option<usize>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub game_type: Option<String>,
}

impl CreateLobbyRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_players(mut self, min_players: usize, max_players: usize) -> Self {
        self.min_players = Some(min_players);
        self.max_players = Some(max_players);
        self
    }

    pub fn with_game_type(mut self, game_type: impl Into<String>) -> Self {
        self.game_type = Some(game_type.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }
}

/// Lobby commands and queries.
///
/// A player belongs to at most one lobby at a time; the service tracks this
/// in its own membership index so the check does not scan every lobby.
pub struct LobbyService {
    store: Arc<HybridLobbyStore>,
    bus: Arc<EventBus>,
    engine: Arc<GameEngine>,
    locks: LobbyLocks,
    memberships: DashMap<PlayerId, LobbyId>,
    settings: LobbySettings,
}

impl LobbyService {
    pub fn new(
        store: Arc<HybridLobbyStore>,
        bus: Arc<EventBus>,
        engine: Arc<GameEngine>,
        settings: LobbySettings,
    ) -> Self {
        Self {
            store,
            bus,
            engine,
            locks: LobbyLocks::new(),
            memberships: DashMap::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<HybridLobbyStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn engine(&self) -> &Arc<GameEngine> {
        &self.engine
    }

    pub fn settings(&self) -> &LobbySettings {
        &self.settings
    }

    /// Creates a lobby owned by `owner`.
    ///
    /// # Arguments
    ///
    /// * `owner` - Player creating the lobby; becomes its first member
    /// * `request` - Name, size bounds, privacy and game type
    ///
    /// # Errors
    ///
    /// * [`LobbyError::Validation`] for a blank or over-long name, size bounds
    ///   outside `2 <= min <= max <= max_players_limit`, or an unknown game
    /// * [`LobbyError::Conflict`] if `owner` is already in a lobby
    /// * [`LobbyError::Transient`] if the store fails
    pub async fn create_lobby(
        &self,
        owner: PlayerId,
        request: CreateLobbyRequest,
    ) -> Result<Lobby, LobbyError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LobbyError::validation("lobby name must not be empty"));
        }
        if name.chars().count() > MAX_LOBBY_NAME_LEN {
            return Err(LobbyError::validation(format!(
                "lobby name must be at most {MAX_LOBBY_NAME_LEN} characters"
            )));
        }

        let min_players = request
            .min_players
            .unwrap_or(self.settings.default_min_players);
        let max_players = request
            .max_players
            .unwrap_or_else(|| self.settings.default_max_players.max(min_players));
        let limit = self.settings.max_players_limit;
        if min_players < 2 || min_players > max_players || max_players > limit {
            return Err(LobbyError::validation(format!(
                "player bounds must satisfy 2 <= min ({min_players}) <= max ({max_players}) <= {limit}"
            )));
        }

        let game_type = request
            .game_type
            .unwrap_or_else(|| self.settings.default_game_type.clone());
        if !self.engine.registry().contains(&game_type) {
            return Err(LobbyError::validation(format!(
                "unknown game type '{game_type}'"
            )));
        }

        let lobby = Lobby::new(
            name,
            owner,
            game_type,
            min_players,
            max_players,
            request.is_private,
        );
        self.reserve_membership(owner, lobby.id)?;
        if let Err(e) = self.store.save(&lobby).await {
            self.release_membership(owner, lobby.id);
            return Err(e.into());
        }

        info!(
            "🏠 Lobby '{}' ({}) created by {}{}",
            lobby.name,
            lobby.id,
            owner,
            if lobby.is_private { " [private]" } else { "" }
        );
        let created = Self::envelope(
            &lobby,
            DomainEvent::LobbyCreated {
                lobby_id: lobby.id,
                name: lobby.name.clone(),
                owner_id: owner,
                max_players: lobby.max_players,
                is_private: lobby.is_private,
            },
        );
        self.publish_all(vec![created]).await;
        Ok(lobby)
    }

    /// Adds `player` to a lobby.
    ///
    /// # Errors
    ///
    /// * [`LobbyError::NotFound`] if the lobby does not exist
    /// * [`LobbyError::Conflict`] if the player is already in a lobby, the
    ///   lobby is full or its game is starting
    /// * [`LobbyError::Transient`] if the store fails
    pub async fn join_lobby(&self, lobby_id: LobbyId, player: PlayerId) -> Result<Lobby, LobbyError> {
        let _guard = self.locks.acquire(lobby_id).await;
        let mut lobby = self.load(lobby_id).await?;

        self.reserve_membership(player, lobby_id)?;
        let transition = match self.admit(&mut lobby, player).await {
            Ok(transition) => transition,
            Err(e) => {
                self.release_membership(player, lobby_id);
                return Err(e);
            }
        };

        info!(
            "👋 Player {} joined lobby {} ({}/{})",
            player,
            lobby_id,
            lobby.player_count(),
            lobby.max_players
        );
        let joined = Self::envelope(
            &lobby,
            DomainEvent::PlayerJoined {
                lobby_id,
                player_id: player,
                player_count: lobby.player_count(),
            },
        );
        let mut events = vec![joined.clone()];
        events.extend(Self::status_event(&lobby, &transition, &joined));
        self.publish_all(events).await;
        Ok(lobby)
    }

    async fn admit(&self, lobby: &mut Lobby, player: PlayerId) -> Result<Transition, LobbyError> {
        let mut machine = lobby.state_machine();
        let transition = machine.fire(LobbyTrigger::PlayerJoined(player))?;
        lobby.commit(&machine);
        self.store.save(lobby).await?;
        Ok(transition)
    }

    /// Removes `player` from a lobby.
    ///
    /// When the last player leaves the lobby is deleted and `None` is
    /// returned. When the owner leaves, ownership passes to the player who
    /// joined earliest.
    ///
    /// # Errors
    ///
    /// * [`LobbyError::NotFound`] if the lobby does not exist or the player
    ///   is not in it
    /// * [`LobbyError::Conflict`] once the lobby's game is starting
    /// * [`LobbyError::Transient`] if the store fails
    pub async fn leave_lobby(
        &self,
        lobby_id: LobbyId,
        player: PlayerId,
    ) -> Result<Option<Lobby>, LobbyError> {
        let _guard = self.locks.acquire(lobby_id).await;
        let mut lobby = self.load(lobby_id).await?;
        if !lobby.has_player(player) {
            return Err(LobbyError::not_found(format!(
                "player {player} is not in lobby {lobby_id}"
            )));
        }

        let mut machine = lobby.state_machine();
        let transition = machine.fire(LobbyTrigger::PlayerLeft(player))?;
        let new_owner = lobby.commit(&machine);

        let left = Self::envelope(
            &lobby,
            DomainEvent::PlayerLeft {
                lobby_id,
                player_id: player,
                player_count: lobby.player_count(),
            },
        );
        let mut events = vec![left.clone()];
        events.extend(Self::status_event(&lobby, &transition, &left));

        if lobby.players.is_empty() {
            self.store.delete(lobby_id).await?;
            self.locks.remove(lobby_id);
            self.release_membership(player, lobby_id);

            info!("🗑️ Lobby {} deleted after its last player left", lobby_id);
            events.push(Self::caused_by(
                &lobby,
                &left,
                DomainEvent::LobbyDeleted { lobby_id },
            ));
            self.publish_all(events).await;
            return Ok(None);
        }

        self.store.save(&lobby).await?;
        self.release_membership(player, lobby_id);

        info!(
            "🚪 Player {} left lobby {} ({}/{})",
            player,
            lobby_id,
            lobby.player_count(),
            lobby.max_players
        );
        if let Some(owner) = new_owner {
            info!("👑 Lobby {} ownership passed to {}", lobby_id, owner);
        }
        self.publish_all(events).await;
        Ok(Some(lobby))
    }

    /// Marks a waiting lobby ready to start. Owner only.
    pub async fn set_ready(&self, lobby_id: LobbyId, requester: PlayerId) -> Result<Lobby, LobbyError> {
        let _guard = self.locks.acquire(lobby_id).await;
        let mut lobby = self.load(lobby_id).await?;
        Self::require_owner(&lobby, requester, "mark the lobby ready")?;

        let mut machine = lobby.state_machine();
        let transition = machine.fire(LobbyTrigger::ReadySet)?;
        lobby.commit(&machine);
        self.store.save(&lobby).await?;

        let changed = Self::status_changed(&lobby, &transition);
        self.publish_all(vec![changed]).await;
        Ok(lobby)
    }

    /// Starts the lobby's game. Owner only.
    ///
    /// The lobby moves to `starting`, which makes it durable, and a game
    /// session is created with the lobby's players in arrival order.
    ///
    /// # Errors
    ///
    /// * [`LobbyError::Validation`] if `requester` is not the owner or the
    ///   roster does not fit the game's player bounds
    /// * [`LobbyError::Conflict`] if the lobby is not `ready` or `full`, or
    ///   has fewer than `min_players`
    /// * [`LobbyError::Transient`] if the lobby could not be persisted; the
    ///   session is cancelled and the lobby is left as it was
    pub async fn start_game(
        &self,
        lobby_id: LobbyId,
        requester: PlayerId,
    ) -> Result<GameSession, LobbyError> {
        let _guard = self.locks.acquire(lobby_id).await;
        let mut lobby = self.load(lobby_id).await?;
        Self::require_owner(&lobby, requester, "start the game")?;

        let mut machine = lobby.state_machine();
        if !machine.can_start_game() {
            return Err(LobbyError::conflict(format!(
                "lobby {} is {} and cannot start a game",
                lobby_id, lobby.status
            )));
        }
        if lobby.player_count() < lobby.min_players {
            return Err(LobbyError::conflict(format!(
                "lobby {} needs at least {} players, has {}",
                lobby_id,
                lobby.min_players,
                lobby.player_count()
            )));
        }

        let transition = machine.fire(LobbyTrigger::GameStarted)?;
        let session = self.engine.start_session(
            &lobby.game_type,
            Some(lobby_id),
            lobby.players.clone(),
            &serde_json::Value::Null,
        )?;

        lobby.commit(&machine);
        lobby.session_id = Some(session.id);
        if let Err(e) = self.store.save(&lobby).await {
            warn!(
                "❌ Could not persist lobby {}, cancelling session {}: {}",
                lobby_id, session.id, e
            );
            if let Err(cancel_error) = self.engine.cancel(session.id) {
                warn!("Failed to cancel session {}: {}", session.id, cancel_error);
            }
            self.engine.remove_session(session.id);
            return Err(e.into());
        }

        info!(
            "🚀 Lobby {} started {} session {}",
            lobby_id, lobby.game_type, session.id
        );
        let changed = Self::status_changed(&lobby, &transition);
        let started = Self::caused_by(
            &lobby,
            &changed,
            DomainEvent::GameStarted {
                lobby_id,
                session_id: session.id,
                game_type: session.game_type.clone(),
                player_ids: session.player_ids.clone(),
            },
        );
        self.publish_all(vec![changed, started]).await;
        Ok(session)
    }

    /// Removes `target` from the lobby on behalf of its owner.
    ///
    /// # Errors
    ///
    /// * [`LobbyError::Validation`] if `requester` is not the owner or tries
    ///   to kick themself
    /// * [`LobbyError::NotFound`] if `target` is not in the lobby
    /// * [`LobbyError::Conflict`] once the lobby's game is starting
    pub async fn kick_player(
        &self,
        lobby_id: LobbyId,
        requester: PlayerId,
        target: PlayerId,
    ) -> Result<Lobby, LobbyError> {
        let _guard = self.locks.acquire(lobby_id).await;
        let mut lobby = self.load(lobby_id).await?;
        Self::require_owner(&lobby, requester, "kick players")?;
        if target == requester {
            return Err(LobbyError::validation("the owner cannot kick themself"));
        }
        if !lobby.has_player(target) {
            return Err(LobbyError::not_found(format!(
                "player {target} is not in lobby {lobby_id}"
            )));
        }

        let mut machine = lobby.state_machine();
        let transition = machine.fire(LobbyTrigger::PlayerLeft(target))?;
        lobby.commit(&machine);
        self.store.save(&lobby).await?;
        self.release_membership(target, lobby_id);

        info!("🥾 Player {} kicked from lobby {} by {}", target, lobby_id, requester);
        let kicked = Self::envelope(
            &lobby,
            DomainEvent::PlayerKicked {
                lobby_id,
                player_id: target,
                kicked_by: requester,
            },
        );
        let mut events = vec![kicked.clone()];
        events.extend(Self::status_event(&lobby, &transition, &kicked));
        self.publish_all(events).await;
        Ok(lobby)
    }

    /// Applies a player's move to a running game.
    ///
    /// When the move ends the game a `game.finished` event follows the
    /// `game.action.applied` event, the lobby leaves the fast tier and its
    /// players become free to join other lobbies.
    pub async fn apply_game_action(
        &self,
        session_id: SessionId,
        player: PlayerId,
        action: GameAction,
    ) -> Result<ActionOutcome, LobbyError> {
        let action_value = serde_json::to_value(&action)
            .map_err(|e| LobbyError::validation(format!("unserializable action: {e}")))?;
        let outcome = self.engine.apply_action(session_id, player, &action)?;

        let applied = EventEnvelope::new(DomainEvent::GameActionApplied {
            session_id,
            player_id: player,
            action: action_value,
            turn_number: outcome.session.state.turn_number,
        });
        let mut events = vec![applied.clone()];

        if outcome.finished {
            events.push(EventEnvelope::caused_by(
                &applied,
                DomainEvent::GameFinished {
                    session_id,
                    winner_id: outcome.session.winner_id,
                },
            ));
            if let Some(lobby_id) = outcome.session.lobby_id {
                self.close_lobby(lobby_id).await;
            }
        }

        self.publish_all(events).await;
        Ok(outcome)
    }

    async fn close_lobby(&self, lobby_id: LobbyId) {
        let _guard = self.locks.acquire(lobby_id).await;
        if let Some(lobby) = self.store.evict(lobby_id) {
            for player in &lobby.players {
                self.release_membership(*player, lobby_id);
            }
            info!("🏁 Lobby {} closed after its game finished", lobby_id);
        }
        if let Err(e) = self.store.delete(lobby_id).await {
            warn!("❌ Failed to drop durable copy of finished lobby {}: {}", lobby_id, e);
        }
        self.locks.remove(lobby_id);
    }

    pub async fn get_lobby(&self, lobby_id: LobbyId) -> Result<Lobby, LobbyError> {
        self.load(lobby_id).await
    }

    /// Public lobbies that can still be joined, oldest first.
    pub fn list_public_lobbies(&self) -> Vec<Lobby> {
        self.store
            .list_active()
            .into_iter()
            .filter(|lobby| !lobby.is_private && !lobby.status.is_terminal())
            .collect()
    }

    /// The lobby `player` currently belongs to, if any.
    pub fn lobby_of(&self, player: PlayerId) -> Option<LobbyId> {
        self.memberships.get(&player).map(|entry| *entry.value())
    }

    pub fn get_session(&self, session_id: SessionId) -> Result<GameSession, LobbyError> {
        self.engine
            .get_session(session_id)
            .ok_or_else(|| LobbyError::not_found(format!("session {session_id} does not exist")))
    }

    async fn load(&self, lobby_id: LobbyId) -> Result<Lobby, LobbyError> {
        self.store
            .find_by_uuid(lobby_id)
            .await?
            .ok_or_else(|| LobbyError::not_found(format!("lobby {lobby_id} does not exist")))
    }

    fn reserve_membership(&self, player: PlayerId, lobby_id: LobbyId) -> Result<(), LobbyError> {
        match self.memberships.entry(player) {
            Entry::Occupied(entry) if *entry.get() == lobby_id => Err(LobbyError::conflict(
                format!("player {player} is already in lobby {lobby_id}"),
            )),
            Entry::Occupied(entry) => Err(LobbyError::conflict(format!(
                "player {player} is already in lobby {}",
                entry.get()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(lobby_id);
                Ok(())
            }
        }
    }

    fn release_membership(&self, player: PlayerId, lobby_id: LobbyId) {
        self.memberships
            .remove_if(&player, |_, member_of| *member_of == lobby_id);
    }

    fn require_owner(lobby: &Lobby, requester: PlayerId, action: &str) -> Result<(), LobbyError> {
        if lobby.is_owner(requester) {
            Ok(())
        } else {
            Err(LobbyError::validation(format!(
                "only the owner of lobby {} can {}",
                lobby.id, action
            )))
        }
    }

    fn envelope(lobby: &Lobby, event: DomainEvent) -> EventEnvelope {
        Self::tagged(lobby, EventEnvelope::new(event))
    }

    fn caused_by(lobby: &Lobby, parent: &EventEnvelope, event: DomainEvent) -> EventEnvelope {
        Self::tagged(lobby, EventEnvelope::caused_by(parent, event))
    }

    fn tagged(lobby: &Lobby, envelope: EventEnvelope) -> EventEnvelope {
        if lobby.is_private {
            envelope.with_tag(PRIVATE_LOBBY_TAG)
        } else {
            envelope
        }
    }

    fn status_changed(lobby: &Lobby, transition: &Transition) -> EventEnvelope {
        Self::envelope(
            lobby,
            DomainEvent::LobbyStatusChanged {
                lobby_id: lobby.id,
                from: transition.from,
                to: transition.to,
                trigger: transition.trigger.name().to_string(),
                player_count: transition.player_count,
            },
        )
    }

    /// A status change caused by `parent`, if the transition changed status.
    fn status_event(
        lobby: &Lobby,
        transition: &Transition,
        parent: &EventEnvelope,
    ) -> Option<EventEnvelope> {
        (transition.from != transition.to).then(|| {
            Self::caused_by(
                lobby,
                parent,
                DomainEvent::LobbyStatusChanged {
                    lobby_id: lobby.id,
                    from: transition.from,
                    to: transition.to,
                    trigger: transition.trigger.name().to_string(),
                    player_count: transition.player_count,
                },
            )
        })
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) {
        for event in events {
            debug!("📣 {} ({})", event.event_type(), event.id());
            self.bus.publish(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::InMemoryDurableStore;
    use arena_event_system::{EventBusConfig, HandlerOutput, LobbyStatus, BUILTIN_EVENT_TYPES};
    use arena_plugin_system::{GamePluginRegistry, SessionStatus};
    use serde_json::json;
    use tokio::sync::Mutex;

    struct Fixture {
        service: LobbyService,
        durable: Arc<InMemoryDurableStore>,
        events: Arc<Mutex<Vec<EventEnvelope>>>,
    }

    impl Fixture {
        async fn event_types(&self) -> Vec<String> {
            self.events
                .lock()
                .await
                .iter()
                .map(|e| e.event_type().to_string())
                .collect()
        }

        async fn clear_events(&self) {
            self.events.lock().await.clear();
        }
    }

    async fn fixture_with(settings: LobbySettings) -> Fixture {
        let bus = Arc::new(EventBus::new(EventBusConfig {
            parallel_processing: false,
            ..EventBusConfig::default()
        }));
        let events = Arc::new(Mutex::new(Vec::new()));
        for event_type in BUILTIN_EVENT_TYPES {
            let events = events.clone();
            bus.subscribe_fn(event_type, 0, "recorder", move |event| {
                let events = events.clone();
                async move {
                    events.lock().await.push(event);
                    Ok(HandlerOutput::done())
                }
            })
            .await;
        }

        let durable = Arc::new(InMemoryDurableStore::new());
        let store = Arc::new(HybridLobbyStore::new(durable.clone()));
        let engine = Arc::new(GameEngine::new(Arc::new(
            GamePluginRegistry::with_builtin_games(),
        )));
        Fixture {
            service: LobbyService::new(store, bus, engine, settings),
            durable,
            events,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(LobbySettings::default()).await
    }

    fn place(row: usize, col: usize) -> GameAction {
        GameAction::new("place", json!({ "row": row, "col": col }))
    }

    #[tokio::test]
    async fn test_create_lobby_validation() {
        let f = fixture().await;
        let owner = PlayerId::new();

        let blank = f.service.create_lobby(owner, CreateLobbyRequest::new("   ")).await;
        assert_eq!(blank.unwrap_err().kind(), "validation");

        let long = CreateLobbyRequest::new("x".repeat(MAX_LOBBY_NAME_LEN + 1));
        assert_eq!(f.service.create_lobby(owner, long).await.unwrap_err().kind(), "validation");

        for (min, max) in [(1, 2), (3, 2), (2, 17)] {
            let request = CreateLobbyRequest::new("bounds").with_players(min, max);
            assert_eq!(
                f.service.create_lobby(owner, request).await.unwrap_err().kind(),
                "validation",
                "{min}..{max} should be rejected"
            );
        }

        let unknown = CreateLobbyRequest::new("chess").with_game_type("chess");
        assert_eq!(f.service.create_lobby(owner, unknown).await.unwrap_err().kind(), "validation");

        // nothing was reserved by the failed attempts
        assert_eq!(f.service.lobby_of(owner), None);
        assert!(f.event_types().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_lobby_uses_defaults_and_publishes() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("  casual  "))
            .await
            .unwrap();

        assert_eq!(lobby.name, "casual");
        assert_eq!((lobby.min_players, lobby.max_players), (2, 2));
        assert_eq!(lobby.game_type, "tic_tac_toe");
        assert_eq!(lobby.status, LobbyStatus::Open);
        assert_eq!(f.service.lobby_of(owner), Some(lobby.id));
        assert_eq!(f.event_types().await, vec!["lobby.created"]);

        // one lobby per player
        let second = f.service.create_lobby(owner, CreateLobbyRequest::new("again")).await;
        assert_eq!(second.unwrap_err().kind(), "conflict");
    }

    #[tokio::test]
    async fn test_join_publishes_status_change_with_causation() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("duel"))
            .await
            .unwrap();
        f.clear_events().await;

        let lobby = f.service.join_lobby(lobby.id, guest).await.unwrap();
        assert_eq!(lobby.status, LobbyStatus::Full);

        let events = f.events.lock().await.clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "lobby.player.joined");
        assert_eq!(events[1].event_type(), "lobby.status.changed");
        assert_eq!(events[1].parent_id(), Some(events[0].id()));
        assert_eq!(events[1].correlation_id(), events[0].correlation_id());
    }

    #[tokio::test]
    async fn test_join_rejections_release_membership() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("duel"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, PlayerId::new()).await.unwrap();

        let late = PlayerId::new();
        let full = f.service.join_lobby(lobby.id, late).await;
        assert_eq!(full.unwrap_err().kind(), "conflict");
        assert_eq!(f.service.lobby_of(late), None);

        let again = f.service.join_lobby(lobby.id, owner).await;
        assert_eq!(again.unwrap_err().kind(), "conflict");
        assert_eq!(f.service.lobby_of(owner), Some(lobby.id));

        let missing = f.service.join_lobby(LobbyId::new(), late).await;
        assert_eq!(missing.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_owner_leaving_hands_over_and_last_leave_deletes() {
        let f = fixture_with(LobbySettings {
            default_max_players: 4,
            ..LobbySettings::default()
        })
        .await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("party"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, guest).await.unwrap();

        let after = f.service.leave_lobby(lobby.id, owner).await.unwrap().unwrap();
        assert_eq!(after.owner_id, guest);
        assert_eq!(after.status, LobbyStatus::Open);
        assert_eq!(f.service.lobby_of(owner), None);

        let stranger = f.service.leave_lobby(lobby.id, owner).await;
        assert_eq!(stranger.unwrap_err().kind(), "not_found");

        f.clear_events().await;
        assert!(f.service.leave_lobby(lobby.id, guest).await.unwrap().is_none());
        assert_eq!(f.event_types().await, vec!["lobby.player.left", "lobby.deleted"]);
        assert_eq!(f.service.get_lobby(lobby.id).await.unwrap_err().kind(), "not_found");
        assert_eq!(f.service.lobby_of(guest), None);
    }

    #[tokio::test]
    async fn test_ready_and_kick_are_owner_only() {
        let f = fixture_with(LobbySettings {
            default_max_players: 4,
            ..LobbySettings::default()
        })
        .await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("party"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, guest).await.unwrap();

        assert_eq!(f.service.set_ready(lobby.id, guest).await.unwrap_err().kind(), "validation");
        let ready = f.service.set_ready(lobby.id, owner).await.unwrap();
        assert_eq!(ready.status, LobbyStatus::Ready);

        assert_eq!(
            f.service.kick_player(lobby.id, guest, owner).await.unwrap_err().kind(),
            "validation"
        );
        assert_eq!(
            f.service.kick_player(lobby.id, owner, owner).await.unwrap_err().kind(),
            "validation"
        );

        f.clear_events().await;
        let after = f.service.kick_player(lobby.id, owner, guest).await.unwrap();
        assert_eq!(after.players, vec![owner]);
        assert_eq!(after.status, LobbyStatus::Waiting);
        assert_eq!(f.service.lobby_of(guest), None);
        assert_eq!(
            f.event_types().await,
            vec!["lobby.player.kicked", "lobby.status.changed"]
        );
    }

    #[tokio::test]
    async fn test_start_game_requires_ready_lobby() {
        let f = fixture_with(LobbySettings {
            default_max_players: 4,
            ..LobbySettings::default()
        })
        .await;
        let owner = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("party"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, PlayerId::new()).await.unwrap();

        // waiting, not ready
        let early = f.service.start_game(lobby.id, owner).await;
        assert_eq!(early.unwrap_err().kind(), "conflict");

        f.service.set_ready(lobby.id, owner).await.unwrap();
        f.service.join_lobby(lobby.id, PlayerId::new()).await.unwrap();

        // tic-tac-toe takes exactly two players
        let crowded = f.service.start_game(lobby.id, owner).await;
        assert_eq!(crowded.unwrap_err().kind(), "validation");
        let lobby = f.service.get_lobby(lobby.id).await.unwrap();
        assert_eq!(lobby.status, LobbyStatus::Ready);
        assert_eq!(f.service.engine().active_session_count(), 0);
    }

    #[tokio::test]
    async fn test_start_game_persists_and_publishes() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("duel"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, guest).await.unwrap();
        f.clear_events().await;

        let session = f.service.start_game(lobby.id, owner).await.unwrap();
        assert_eq!(session.player_ids, vec![owner, guest]);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert!(f.durable.contains(lobby.id));

        let lobby = f.service.get_lobby(lobby.id).await.unwrap();
        assert_eq!(lobby.status, LobbyStatus::Starting);
        assert_eq!(lobby.session_id, Some(session.id));
        assert!(f.service.list_public_lobbies().is_empty());

        let events = f.events.lock().await.clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "lobby.status.changed");
        assert_eq!(events[1].event_type(), "game.started");
        assert_eq!(events[1].parent_id(), Some(events[0].id()));

        // no leaving once starting
        let leave = f.service.leave_lobby(lobby.id, guest).await;
        assert_eq!(leave.unwrap_err().kind(), "conflict");
    }

    #[tokio::test]
    async fn test_failed_persist_cancels_session() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("duel"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, PlayerId::new()).await.unwrap();
        f.durable.set_available(false);

        let result = f.service.start_game(lobby.id, owner).await;
        assert_eq!(result.unwrap_err().kind(), "transient");
        assert_eq!(f.service.engine().active_session_count(), 0);

        let lobby = f.service.get_lobby(lobby.id).await.unwrap();
        assert_eq!(lobby.status, LobbyStatus::Full);
        assert_eq!(lobby.session_id, None);
    }

    #[tokio::test]
    async fn test_finished_game_frees_players() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("duel"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, guest).await.unwrap();
        let session = f.service.start_game(lobby.id, owner).await.unwrap();

        let moves = [(owner, 0, 0), (guest, 1, 0), (owner, 0, 1), (guest, 1, 1)];
        for (player, row, col) in moves {
            let outcome = f
                .service
                .apply_game_action(session.id, player, place(row, col))
                .await
                .unwrap();
            assert!(!outcome.finished);
        }

        // out of turn
        let rejected = f.service.apply_game_action(session.id, guest, place(2, 2)).await;
        assert_eq!(rejected.unwrap_err().kind(), "validation");

        f.clear_events().await;
        let outcome = f
            .service
            .apply_game_action(session.id, owner, place(0, 2))
            .await
            .unwrap();
        assert!(outcome.finished);
        assert_eq!(outcome.session.winner_id, Some(owner));
        assert_eq!(
            f.event_types().await,
            vec!["game.action.applied", "game.finished"]
        );

        assert_eq!(f.service.lobby_of(owner), None);
        assert_eq!(f.service.lobby_of(guest), None);
        assert!(f.service.store().is_empty());
        assert!(f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("rematch"))
            .await
            .is_ok());

        let after = f.service.apply_game_action(session.id, guest, place(2, 2)).await;
        assert_eq!(after.unwrap_err().kind(), "conflict");
    }

    #[tokio::test]
    async fn test_finished_lobby_is_gone_from_both_tiers() {
        let f = fixture().await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("duel"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, guest).await.unwrap();
        let session = f.service.start_game(lobby.id, owner).await.unwrap();
        assert!(f.durable.contains(lobby.id));

        let moves = [(owner, 0, 0), (guest, 1, 1), (owner, 0, 1), (guest, 2, 2), (owner, 0, 2)];
        for (player, row, col) in moves {
            f.service
                .apply_game_action(session.id, player, place(row, col))
                .await
                .unwrap();
        }
        assert!(!f.durable.contains(lobby.id));

        let late = f.service.join_lobby(lobby.id, PlayerId::new()).await;
        assert_eq!(late.unwrap_err().kind(), "not_found");
        assert_eq!(f.service.get_lobby(lobby.id).await.unwrap_err().kind(), "not_found");
        assert!(f.service.store().is_empty());
        assert!(f.service.store().find_by_player(owner).is_none());
    }

    #[tokio::test]
    async fn test_last_player_leaves_after_ready_lobby_shrinks() {
        let f = fixture_with(LobbySettings {
            default_max_players: 4,
            ..LobbySettings::default()
        })
        .await;
        let owner = PlayerId::new();
        let guest = PlayerId::new();
        let lobby = f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("party"))
            .await
            .unwrap();
        f.service.join_lobby(lobby.id, guest).await.unwrap();
        f.service.set_ready(lobby.id, owner).await.unwrap();
        let shrunk = f.service.kick_player(lobby.id, owner, guest).await.unwrap();
        assert_eq!(shrunk.status, LobbyStatus::Waiting);
        assert_eq!(shrunk.players, vec![owner]);

        f.clear_events().await;
        let left = f.service.leave_lobby(lobby.id, owner).await.unwrap();
        assert!(left.is_none());
        assert_eq!(f.service.lobby_of(owner), None);
        assert!(f.service.store().is_empty());
        assert_eq!(
            f.event_types().await,
            vec!["lobby.player.left", "lobby.status.changed", "lobby.deleted"]
        );
        assert!(f
            .service
            .create_lobby(owner, CreateLobbyRequest::new("again"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_private_lobby_events_are_tagged_and_unlisted() {
        let f = fixture().await;
        let lobby = f
            .service
            .create_lobby(PlayerId::new(), CreateLobbyRequest::new("secret").private())
            .await
            .unwrap();
        let public = f
            .service
            .create_lobby(PlayerId::new(), CreateLobbyRequest::new("open"))
            .await
            .unwrap();

        let listed: Vec<LobbyId> = f.service.list_public_lobbies().iter().map(|l| l.id).collect();
        assert_eq!(listed, vec![public.id]);

        let events = f.events.lock().await.clone();
        assert!(events[0].has_tag(PRIVATE_LOBBY_TAG));
        assert!(!events[1].has_tag(PRIVATE_LOBBY_TAG));
        assert_eq!(events[0].payload().lobby_id(), Some(lobby.id));
    }

    #[tokio::test]
    async fn test_get_session_not_found() {
        let f = fixture().await;
        assert_eq!(
            f.service.get_session(SessionId::new()).unwrap_err().kind(),
            "not_found"
        );
    }
}
