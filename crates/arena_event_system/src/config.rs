//! Event bus configuration.
//!
//! The options map one-to-one to the `[event_bus]` table of the server
//! configuration file. Every field has a serde default, so a partial table is
//! valid.

use crate::error::EventError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_max_retry_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_handler_timeout_ms() -> u64 {
    5_000
}

fn default_event_store_capacity() -> usize {
    1_000
}

/// Delay growth between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
    /// `retry_delay_ms * attempt`
    #[default]
    Linear,
    /// `retry_delay_ms * 2^(attempt - 1)`
    Exponential,
}

/// Dispatch policy of the [`crate::EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Run all handlers of an event concurrently (`true`) or sequentially in
    /// priority order (`false`)
    #[serde(default = "default_true")]
    pub parallel_processing: bool,
    /// Retries after the initial attempt; `0` disables retrying
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Base delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound for a single handler attempt in milliseconds, must be > 0
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
    /// Log every handler attempt at debug level
    #[serde(default)]
    pub enable_detailed_logging: bool,
    /// Keep a bounded in-memory history of published envelopes
    #[serde(default)]
    pub enable_event_store: bool,
    /// Maximum number of envelopes retained when the event store is enabled
    #[serde(default = "default_event_store_capacity")]
    pub event_store_capacity: usize,
    /// Growth of the retry delay
    #[serde(default)]
    pub retry_backoff: RetryBackoff,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            parallel_processing: true,
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            handler_timeout_ms: default_handler_timeout_ms(),
            enable_detailed_logging: false,
            enable_event_store: false,
            event_store_capacity: default_event_store_capacity(),
            retry_backoff: RetryBackoff::Linear,
        }
    }
}

impl EventBusConfig {
    /// Checks the configuration for values the bus cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidConfig`] when `handler_timeout_ms` is zero
    /// or the event store is enabled with a zero capacity.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.handler_timeout_ms == 0 {
            return Err(EventError::InvalidConfig(
                "handler_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.enable_event_store && self.event_store_capacity == 0 {
            return Err(EventError::InvalidConfig(
                "event_store_capacity must be greater than zero when the event store is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Delay to wait before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let millis = match self.retry_backoff {
            RetryBackoff::Linear => self.retry_delay_ms.saturating_mul(u64::from(attempt)),
            RetryBackoff::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                self.retry_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EventBusConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.parallel_processing);
        assert_eq!(config.max_retry_attempts, 2);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = EventBusConfig {
            handler_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EventError::InvalidConfig(_))));
    }

    #[test]
    fn test_event_store_requires_capacity() {
        let config = EventBusConfig {
            enable_event_store: true,
            event_store_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delays() {
        let linear = EventBusConfig {
            retry_delay_ms: 10,
            ..Default::default()
        };
        assert_eq!(linear.retry_delay(1), Duration::from_millis(10));
        assert_eq!(linear.retry_delay(3), Duration::from_millis(30));

        let exponential = EventBusConfig {
            retry_delay_ms: 10,
            retry_backoff: RetryBackoff::Exponential,
            ..Default::default()
        };
        assert_eq!(exponential.retry_delay(1), Duration::from_millis(10));
        assert_eq!(exponential.retry_delay(3), Duration::from_millis(40));
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: EventBusConfig =
            serde_json::from_str(r#"{"parallel_processing": false}"#).unwrap();
        assert!(!config.parallel_processing);
        assert_eq!(config.handler_timeout_ms, 5_000);
        assert_eq!(config.retry_backoff, RetryBackoff::Linear);
    }
}
