/// Per-handler dispatch outcomes
use super::core::SubscriptionId;
use crate::error::FailureKind;
use crate::events::EventEnvelope;
use crate::types::EventId;
use std::time::Duration;

/// Outcome of delivering one event to one handler, covering every attempt.
#[derive(Debug, Clone)]
pub struct EventExecutionResult {
    pub handler_name: String,
    pub subscription_id: SubscriptionId,
    pub success: bool,
    /// Handler message on success, failure description otherwise
    pub message: Option<String>,
    /// Wall time across all attempts, including retry delays
    pub duration: Duration,
    /// Attempts made; `0` for a skipped handler
    pub attempts: u32,
    pub failure: Option<FailureKind>,
    /// Events the handler raised on its successful attempt
    pub generated_events: Vec<EventEnvelope>,
}

impl EventExecutionResult {
    pub(super) fn skipped(handler_name: &str, subscription_id: SubscriptionId) -> Self {
        Self {
            handler_name: handler_name.to_string(),
            subscription_id,
            success: false,
            message: Some("skipped after a fatal failure".to_string()),
            duration: Duration::ZERO,
            attempts: 0,
            failure: Some(FailureKind::Skipped),
            generated_events: Vec::new(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.failure == Some(FailureKind::Timeout)
    }
}

/// Everything `publish_and_wait` learned about one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event_id: EventId,
    pub event_type: String,
    /// One entry per subscription in the dispatch snapshot, in subscription
    /// order (priority, then registration)
    pub results: Vec<EventExecutionResult>,
}

impl DispatchReport {
    /// True when nobody was subscribed to the event type.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EventExecutionResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Looks up the result for a handler by name.
    pub fn result_for(&self, handler_name: &str) -> Option<&EventExecutionResult> {
        self.results.iter().find(|r| r.handler_name == handler_name)
    }
}
