//! Error types for the event bus, bridges and transport.

use serde::{Deserialize, Serialize};

/// Errors that can occur during event system operations.
///
/// These are surfaced to the code constructing events or configuring the
/// bus. Handler failures never appear here: they are reported through
/// [`crate::EventExecutionResult`] instead.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Event type is not a dot-namespaced identifier
    #[error("Invalid event type '{0}': expected lowercase dot-namespaced segments")]
    InvalidEventType(String),
    /// Bus configuration rejected
    #[error("Invalid event bus configuration: {0}")]
    InvalidConfig(String),
    /// Serialization failed when converting an event to JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure signalled by an event handler.
///
/// The distinction drives the dispatch policy: retryable failures are
/// retried in place up to the configured budget, fatal failures are never
/// retried and short-circuit sequential dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Transient failure, eligible for retry
    #[error("retryable failure: {0}")]
    Retryable(String),
    /// Non-retryable failure
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        HandlerError::Retryable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        HandlerError::Fatal(message.into())
    }

    /// Whether the dispatcher may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }
}

/// Classification of a failed handler outcome, as recorded in execution
/// results and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Last attempt exceeded `handler_timeout_ms`
    Timeout,
    /// Last attempt returned a retryable error and the budget ran out
    Retryable,
    /// Handler returned a fatal error
    Fatal,
    /// Handler panicked; treated as fatal
    Panicked,
    /// Handler never ran because an earlier handler failed fatally
    Skipped,
}

impl FailureKind {
    /// Fatal outcomes halt sequential dispatch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureKind::Fatal | FailureKind::Panicked)
    }
}

/// Errors raised by the transport collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Channel name rejected by the transport
    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),
    /// Transport is shut down or otherwise unavailable
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while a module bridge forwards an event.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Broadcasting to a channel failed
    #[error("Broadcast to channel '{channel}' failed: {source}")]
    Transport {
        channel: String,
        #[source]
        source: TransportError,
    },
    /// The bridge could not build its outbound payload
    #[error("Failed to transform event {event_type}: {reason}")]
    Transform { event_type: String, reason: String },
}
