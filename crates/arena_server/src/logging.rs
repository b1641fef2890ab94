//! Logging system setup and configuration
//!
//! This module handles the initialization of the tracing-based logging system
//! used throughout the server for debugging, monitoring, and diagnostic output.

use crate::config::LoggingSettings;
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system
///
/// Sets up structured logging using the tracing crate with configurable
/// output format and filtering levels.
///
/// # Arguments
/// * `settings` - Level filter and output format
///
/// # Environment Variables
/// * `RUST_LOG` - Override the configured filter (e.g., "debug", "arena_server=trace")
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn setup_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let result = if settings.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
    };

    result.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
