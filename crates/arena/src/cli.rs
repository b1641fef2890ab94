//! Command-line interface handling for the Arena lobby server.
//!
//! Flags given here override the matching values of the configuration file.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to dispatch events sequentially instead of in parallel
    pub sequential: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// Exits with a usage message when the arguments are invalid.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            sequential: matches.get_flag("sequential"),
        }
    }
}

fn command() -> Command {
    Command::new("Arena Lobby Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Event-driven multiplayer lobby server with pluggable turn-based games")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sequential")
                .long("sequential")
                .help("Dispatch events to handlers one at a time")
                .action(ArgAction::SetTrue),
        )
}
