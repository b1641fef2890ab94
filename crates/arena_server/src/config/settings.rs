//! Configuration settings structures
//!
//! Every table and field has a default, so an empty file is a valid
//! configuration and a partial file only overrides what it names.

use arena_event_system::EventBusConfig;
use arena_plugin_system::TIC_TAC_TOE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
///
/// This is the root configuration object. It can be serialized to/from TOML
/// format for configuration files.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Event bus dispatch policy
    pub event_bus: EventBusConfig,
    /// Lobby defaults and limits
    pub lobby: LobbySettings,
    /// Durable lobby storage
    pub storage: StorageSettings,
    /// Logging output
    pub logging: LoggingSettings,
}

/// Lobby defaults and limits.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LobbySettings {
    /// Used when a create request does not name a minimum
    pub default_min_players: usize,
    /// Used when a create request does not name a maximum
    pub default_max_players: usize,
    /// Upper bound for any lobby's `max_players`
    pub max_players_limit: usize,
    /// Game played when a create request does not name one
    pub default_game_type: String,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            default_min_players: 2,
            default_max_players: 2,
            max_players_limit: 16,
            default_game_type: TIC_TAC_TOE.to_string(),
        }
    }
}

/// Which durable store backs lobbies that reached `starting`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process memory; nothing survives a restart
    #[default]
    Memory,
    /// One JSON file per lobby under `directory`
    Json,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Directory for the `json` backend
    pub directory: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            directory: PathBuf::from("data/lobbies"),
        }
    }
}

/// Logging system configuration
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Logging level filter
    ///
    /// Valid values: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Enable JSON-formatted log output
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
