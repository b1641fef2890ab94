//! # Arena Server
//!
//! Lobby lifecycle and command layer of the Arena lobby server.
//!
//! Players gather in lobbies, the owner starts a game, and the game engine
//! takes over. Every lobby lives in an in-memory fast tier; once its game is
//! starting it is also written to a durable store so it can be recovered.
//!
//! ## Modules
//!
//! - [`config`] - TOML configuration with defaults
//! - [`lobby`] - Lobby model, state machine, per-lobby locks and storage
//! - [`service`] - [`LobbyService`], the commands and queries
//! - [`server`] - [`ArenaServer`], which wires everything together
//! - [`logging`] - `tracing` subscriber setup

pub mod config;
pub mod error;
pub mod lobby;
pub mod logging;
pub mod server;
pub mod service;

pub use config::{load_config, Config};
pub use error::{LobbyError, ServerError, StoreError};
pub use server::ArenaServer;
pub use service::{CreateLobbyRequest, LobbyService, MAX_LOBBY_NAME_LEN};
