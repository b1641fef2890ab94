//! # Arena Event System
//!
//! The event backbone of the Arena lobby server. Commands mutate lobbies and
//! game sessions, then announce what happened as domain events; everything
//! downstream (real-time fan-out, diagnostics) reacts to those events.
//!
//! ## Core Components
//!
//! - [`EventEnvelope`] / [`DomainEvent`] - Immutable event values with
//!   identity, causality and a typed payload
//! - [`EventBus`] - Publish/subscribe distributor with priority ordering,
//!   per-attempt timeouts, retries and panic isolation
//! - [`EventHandler`] - Async handler trait, with [`FnHandler`] for closures
//! - [`BridgeRegistry`] / [`ModuleBridge`] - Per-module forwarding of events
//!   to [`Transport`] channels
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arena_event_system::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), EventError> {
//! let bus = create_event_bus();
//!
//! // Forward lobby and game events to in-process channels
//! let transport = Arc::new(ChannelTransport::default());
//! let bridges = Arc::new(BridgeRegistry::new(transport.clone()));
//! bridges.register(Arc::new(LobbyBridge::new())).await;
//! bridges.register(Arc::new(GameBridge::new())).await;
//! bridges.attach(&bus, &["lobby.created", "game.finished"]).await;
//!
//! bus.publish(EventEnvelope::new(DomainEvent::LobbyDeleted { lobby_id: LobbyId::new() }))
//!     .await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery Semantics
//!
//! Delivery is at-most-once per attempt: a handler attempt that exceeds
//! `handler_timeout_ms` is dropped and retried up to `max_retry_attempts`
//! times. Handler failures never propagate to the publisher; they are visible
//! in [`DispatchReport`] and [`EventBusStats`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod system;
pub mod types;
pub mod utils;

pub use bridge::*;
pub use config::{EventBusConfig, RetryBackoff};
pub use error::{BridgeError, EventError, FailureKind, HandlerError, TransportError};
pub use events::{validate_event_type, DomainEvent, EventEnvelope, BUILTIN_EVENT_TYPES};
pub use handler::{EventHandler, FnHandler, HandlerOutput, HandlerResult};
pub use system::{
    DispatchReport, EventBus, EventBusStats, EventExecutionResult, HandlerStats, Subscription,
    SubscriptionId,
};
pub use types::*;
pub use utils::{create_event_bus, create_event_bus_with_config, current_timestamp};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
