//! # Arena Plugin System
//!
//! Turn-based games are plugins. A [`GamePlugin`] is a pure rule book that
//! builds, validates and advances an opaque [`GameState`]; the
//! [`GamePluginRegistry`] maps game types to plugins and the [`GameEngine`]
//! owns the live [`GameSession`]s.
//!
//! ## Adding a game
//!
//! Implement [`GamePlugin`] and register it at startup:
//!
//! ```rust
//! use arena_plugin_system::{GamePluginRegistry, TicTacToe};
//! use std::sync::Arc;
//!
//! let registry = GamePluginRegistry::new();
//! registry.register(Arc::new(TicTacToe::new())).unwrap();
//! assert!(registry.contains("tic_tac_toe"));
//! ```

pub mod engine;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod session;
pub mod state;
pub mod tic_tac_toe;

pub use engine::{ActionOutcome, GameEngine};
pub use error::GameError;
pub use plugin::GamePlugin;
pub use registry::GamePluginRegistry;
pub use session::{GameSession, SessionStatus};
pub use state::{ActionValidation, GameAction, GameState};
pub use tic_tac_toe::{TicTacToe, TIC_TAC_TOE};
