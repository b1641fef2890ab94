//! Configuration module for the Arena server
//!
//! This module handles configuration file parsing and validation, and
//! provides default settings for the server.

pub mod settings;

pub use settings::{Config, LobbySettings, LoggingSettings, StorageBackend, StorageSettings};

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{info, warn};

impl Config {
    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.event_bus.validate()?;

        let lobby = &self.lobby;
        if lobby.max_players_limit < 2 {
            bail!("lobby.max_players_limit must be at least 2");
        }
        if lobby.default_min_players < 2
            || lobby.default_min_players > lobby.default_max_players
            || lobby.default_max_players > lobby.max_players_limit
        {
            bail!(
                "lobby defaults must satisfy 2 <= default_min_players ({}) <= default_max_players ({}) <= max_players_limit ({})",
                lobby.default_min_players,
                lobby.default_max_players,
                lobby.max_players_limit
            );
        }
        if lobby.default_game_type.trim().is_empty() {
            bail!("lobby.default_game_type must not be empty");
        }
        Ok(())
    }
}

/// Load configuration from file or create default configuration
///
/// This function attempts to load configuration from the specified file.
/// If the file doesn't exist, it creates a default configuration file
/// and returns the default settings.
///
/// # Arguments
/// * `path` - Path of the TOML configuration file
///
/// # Errors
/// * Returns error if file I/O operations fail
/// * Returns error if TOML parsing or validation fails
pub async fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let config_str = tokio::fs::read_to_string(path).await?;
        let config = match toml::de::from_str::<Config>(&config_str) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file {}: {}", path.display(), e);
                return Err(e.into());
            }
        };
        config.validate()?;
        Ok(config)
    } else {
        warn!("Configuration file not found: {}, using defaults", path.display());

        let default_config = Config::default();
        let config_str = toml::to_string_pretty(&default_config)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, config_str).await?;
        info!("Created default configuration file: {}", path.display());

        Ok(default_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_config_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.toml");

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.lobby.default_game_type, "tic_tac_toe");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(path.exists());

        // the written default parses back
        let reloaded = load_config(&path).await.unwrap();
        assert_eq!(reloaded.lobby, config.lobby);
    }

    #[tokio::test]
    async fn test_load_config_existing() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[event_bus]
parallel_processing = false
max_retry_attempts = 4
retry_backoff = "exponential"

[lobby]
default_max_players = 6

[storage]
backend = "json"
directory = "/tmp/arena-lobbies"

[logging]
level = "debug"
json_format = true
        "#;
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = load_config(temp_file.path()).await.unwrap();
        assert!(!config.event_bus.parallel_processing);
        assert_eq!(config.event_bus.max_retry_attempts, 4);
        assert_eq!(config.event_bus.handler_timeout_ms, 5_000);
        assert_eq!(config.lobby.default_max_players, 6);
        assert_eq!(config.lobby.default_min_players, 2);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid_limits() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[lobby]\ndefault_max_players = 32\nmax_players_limit = 8\n")
            .unwrap();
        assert!(load_config(temp_file.path()).await.is_err());

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[event_bus]\nhandler_timeout_ms = 0\n")
            .unwrap();
        assert!(load_config(temp_file.path()).await.is_err());
    }
}
