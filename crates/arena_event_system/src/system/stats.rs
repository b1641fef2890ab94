/// Statistics tracking for the event bus
use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Statistics about the event bus's performance and usage.
///
/// These statistics are useful for monitoring system health and debugging
/// delivery issues. Event-delivery failures never reach the end user; this
/// is where they surface.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn example(bus: std::sync::Arc<arena_event_system::EventBus>) {
/// let stats = bus.get_stats().await;
/// println!("{} published, {} processed", stats.events_published, stats.events_processed);
/// # }
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EventBusStats {
    /// Total number of live subscriptions
    pub total_subscriptions: usize,
    /// Events handed to `publish`/`publish_and_wait`
    pub events_published: u64,
    /// Events whose dispatch finished (all handlers settled)
    pub events_processed: u64,
    /// Events published while no handler was subscribed to their type
    pub zero_handler_events: u64,
    /// Events raised by handlers and published after their dispatch
    pub generated_events: u64,
    /// Per-handler statistics keyed by handler name
    pub handlers: HashMap<String, HandlerStats>,
}

/// Statistics for an individual handler.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HandlerStats {
    /// Completed invocations (an invocation covers all of its attempts)
    pub invocations: u64,
    /// Invocations that ended successfully
    pub successes: u64,
    /// Invocations that ended in failure
    pub errors: u64,
    /// Individual attempts that exceeded the timeout
    pub timeouts: u64,
    /// Retry attempts performed
    pub retries: u64,
    /// Sum of invocation durations in microseconds
    pub total_duration_us: u64,
    /// Average invocation latency in milliseconds
    pub average_latency_ms: f64,
}

impl EventBusStats {
    /// Records one finished handler invocation.
    pub(crate) fn record_invocation(
        &mut self,
        handler_name: &str,
        duration: Duration,
        attempts: u32,
        timeouts: u32,
        failure: Option<FailureKind>,
    ) {
        let stats = self.handlers.entry(handler_name.to_string()).or_default();
        stats.invocations += 1;
        stats.retries += u64::from(attempts.saturating_sub(1));
        stats.timeouts += u64::from(timeouts);
        match failure {
            None => stats.successes += 1,
            Some(_) => stats.errors += 1,
        }

        stats.total_duration_us += duration.as_micros() as u64;
        stats.average_latency_ms =
            stats.total_duration_us as f64 / stats.invocations as f64 / 1_000.0;
    }

    /// Total number of failed invocations across all handlers.
    pub fn total_errors(&self) -> u64 {
        self.handlers.values().map(|h| h.errors).sum()
    }
}
