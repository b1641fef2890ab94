use crate::error::GameError;
use crate::plugin::GamePlugin;
use crate::tic_tac_toe::TicTacToe;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Maps each game type to exactly one plugin.
///
/// Plugins are registered at startup and shared through
/// `Arc<GamePluginRegistry>`; there is no global registry.
#[derive(Default)]
pub struct GamePluginRegistry {
    plugins: DashMap<String, Arc<dyn GamePlugin>>,
}

impl std::fmt::Debug for GamePluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamePluginRegistry")
            .field("game_types", &self.game_types())
            .finish()
    }
}

impl GamePluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in game registered.
    pub fn with_builtin_games() -> Self {
        let registry = Self::new();
        // a fresh registry cannot hold a duplicate
        let _ = registry.register(Arc::new(TicTacToe::new()));
        registry
    }

    /// Registers a plugin under its id.
    ///
    /// # Errors
    ///
    /// [`GameError::DuplicateGameType`] if the id is already taken; the
    /// existing plugin stays registered.
    pub fn register(&self, plugin: Arc<dyn GamePlugin>) -> Result<(), GameError> {
        let game_type = plugin.id().to_string();
        match self.plugins.entry(game_type.clone()) {
            Entry::Occupied(_) => Err(GameError::DuplicateGameType(game_type)),
            Entry::Vacant(slot) => {
                info!(
                    "🎲 Registered game '{}' ({}-{} players)",
                    game_type,
                    plugin.min_players(),
                    plugin.max_players()
                );
                slot.insert(plugin);
                Ok(())
            }
        }
    }

    pub fn get(&self, game_type: &str) -> Result<Arc<dyn GamePlugin>, GameError> {
        self.plugins
            .get(game_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GameError::UnknownGameType(game_type.to_string()))
    }

    pub fn contains(&self, game_type: &str) -> bool {
        self.plugins.contains_key(game_type)
    }

    /// Registered game types, sorted.
    pub fn game_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_game_type_rejected() {
        let registry = GamePluginRegistry::with_builtin_games();
        let result = registry.register(Arc::new(TicTacToe::new()));
        assert_eq!(
            result,
            Err(GameError::DuplicateGameType("tic_tac_toe".to_string()))
        );
        assert_eq!(registry.game_types(), vec!["tic_tac_toe".to_string()]);
    }

    #[test]
    fn test_unknown_game_type() {
        let registry = GamePluginRegistry::new();
        assert!(matches!(
            registry.get("chess"),
            Err(GameError::UnknownGameType(t)) if t == "chess"
        ));
    }
}
