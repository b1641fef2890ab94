//! # Utility Functions
//!
//! Small helpers shared across the Arena crates.
//!
//! - [`current_timestamp()`] - Consistent timestamp generation
//! - [`create_event_bus()`] - Event bus factory function

use crate::config::EventBusConfig;
use crate::system::EventBus;
use std::sync::Arc;

/// Returns the current Unix timestamp in milliseconds.
///
/// All envelopes, lobbies and sessions use this function for timestamp
/// generation so values are comparable across the system. A clock set before
/// the Unix epoch yields `0` instead of panicking.
///
/// # Examples
///
/// ```rust
/// use arena_event_system::current_timestamp;
///
/// let before = current_timestamp();
/// let after = current_timestamp();
/// assert!(after >= before);
/// ```
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Creates a new event bus with the default configuration.
///
/// This is the primary factory function for creating bus instances. It
/// returns an `Arc<EventBus>` that can be shared across tasks; parallel
/// dispatch spawns tasks that hold a clone of this `Arc`.
///
/// # Examples
///
/// ```rust
/// use arena_event_system::create_event_bus;
///
/// let bus = create_event_bus();
/// assert!(bus.config().parallel_processing);
/// ```
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::new(EventBusConfig::default()))
}

/// Creates a new event bus with an explicit configuration.
pub fn create_event_bus_with_config(config: EventBusConfig) -> Arc<EventBus> {
    Arc::new(EventBus::new(config))
}
