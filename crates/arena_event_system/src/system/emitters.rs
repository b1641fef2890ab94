/// Event emission and dispatch
use super::core::{EventBus, Subscription};
use super::outcome::{DispatchReport, EventExecutionResult};
use crate::error::{FailureKind, HandlerError};
use crate::events::EventEnvelope;
use crate::handler::HandlerOutput;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Extracts a readable message from a caught panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

impl EventBus {
    /// Publishes an event without waiting for its handlers.
    ///
    /// Handler failures are never surfaced to the caller. With parallel
    /// processing the dispatch runs on a spawned task and this returns as soon
    /// as it is scheduled; with sequential processing this returns once every
    /// handler has settled.
    pub async fn publish(self: &Arc<Self>, event: EventEnvelope) {
        if self.config.parallel_processing {
            let bus = Arc::clone(self);
            tokio::spawn(async move {
                bus.dispatch(event).await;
            });
        } else {
            self.dispatch(event).await;
        }
    }

    /// Publishes an event and waits for every handler to finish, retry or
    /// exhaust its retries.
    ///
    /// # Returns
    ///
    /// A [`DispatchReport`] with one [`EventExecutionResult`] per handler
    /// subscribed at publish time. An event nobody subscribed to yields an
    /// empty report.
    pub async fn publish_and_wait(self: &Arc<Self>, event: EventEnvelope) -> DispatchReport {
        self.dispatch(event).await
    }

    async fn dispatch(self: &Arc<Self>, event: EventEnvelope) -> DispatchReport {
        {
            let mut stats = self.stats.write().await;
            stats.events_published += 1;
        }
        self.record_in_store(&event).await;

        let snapshot = self.snapshot(event.event_type()).await;
        if snapshot.is_empty() {
            let mut stats = self.stats.write().await;
            stats.zero_handler_events += 1;
            stats.events_processed += 1;
            debug!("⚠️ No handlers for event: {}", event.event_type());
            return DispatchReport {
                event_id: event.id(),
                event_type: event.event_type().to_string(),
                results: Vec::new(),
            };
        }

        debug!("📤 Emitting {} to {} handlers", event.event_type(), snapshot.len());

        let results = if self.config.parallel_processing {
            self.run_parallel(&snapshot, &event).await
        } else {
            self.run_sequential(&snapshot, &event).await
        };

        let generated: Vec<EventEnvelope> = results
            .iter()
            .flat_map(|r| r.generated_events.iter().cloned())
            .collect();

        {
            let mut stats = self.stats.write().await;
            stats.events_processed += 1;
            stats.generated_events += generated.len() as u64;
        }

        if !generated.is_empty() {
            self.publish_generated(generated).await;
        }

        DispatchReport {
            event_id: event.id(),
            event_type: event.event_type().to_string(),
            results,
        }
    }

    /// Publishes handler-generated events once their parent dispatch is over.
    ///
    /// Boxed because publishing re-enters `dispatch`.
    fn publish_generated(self: &Arc<Self>, events: Vec<EventEnvelope>) -> BoxFuture<'static, ()> {
        let bus = Arc::clone(self);
        async move {
            for event in events {
                bus.publish(event).await;
            }
        }
        .boxed()
    }

    async fn run_sequential(
        &self,
        snapshot: &[Subscription],
        event: &EventEnvelope,
    ) -> Vec<EventExecutionResult> {
        let mut results = Vec::with_capacity(snapshot.len());
        let mut halted = false;

        for subscription in snapshot {
            if halted {
                results.push(EventExecutionResult::skipped(
                    subscription.handler_name(),
                    subscription.id,
                ));
                continue;
            }

            let result = self.invoke(subscription, event).await;
            if result.failure.is_some_and(|f| f.is_fatal()) {
                warn!(
                    "⛔ Fatal failure in '{}' halts dispatch of {}",
                    result.handler_name,
                    event.event_type()
                );
                halted = true;
            }
            results.push(result);
        }

        results
    }

    async fn run_parallel(
        &self,
        snapshot: &[Subscription],
        event: &EventEnvelope,
    ) -> Vec<EventExecutionResult> {
        let mut futures = FuturesUnordered::new();
        for (index, subscription) in snapshot.iter().enumerate() {
            futures.push(async move { (index, self.invoke(subscription, event).await) });
        }

        let mut slots: Vec<Option<EventExecutionResult>> = vec![None; snapshot.len()];
        while let Some((index, result)) = futures.next().await {
            slots[index] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }

    /// Runs one handler with timeout and retry, returning its settled outcome.
    async fn invoke(&self, subscription: &Subscription, event: &EventEnvelope) -> EventExecutionResult {
        let handler_name = subscription.handler_name().to_string();
        let max_attempts = self.config.max_retry_attempts.saturating_add(1);
        let timeout = self.config.handler_timeout();
        let started = Instant::now();

        let mut attempt_event = event.clone();
        let mut attempts = 0u32;
        let mut timeouts = 0u32;

        let outcome: Result<HandlerOutput, (FailureKind, String)> = loop {
            attempts += 1;
            if self.config.enable_detailed_logging {
                debug!(
                    "🔁 '{}' attempt {}/{} for {} ({})",
                    handler_name,
                    attempts,
                    max_attempts,
                    attempt_event.event_type(),
                    attempt_event.id()
                );
            }

            let call = AssertUnwindSafe(subscription.handler.handle(&attempt_event)).catch_unwind();
            let failure = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(Ok(output))) => break Ok(output),
                Ok(Ok(Err(HandlerError::Fatal(message)))) => {
                    break Err((FailureKind::Fatal, message))
                }
                Ok(Ok(Err(HandlerError::Retryable(message)))) => (FailureKind::Retryable, message),
                Ok(Err(panic)) => break Err((FailureKind::Panicked, panic_message(&*panic))),
                Err(_) => {
                    timeouts += 1;
                    (
                        FailureKind::Timeout,
                        format!("timed out after {}ms", self.config.handler_timeout_ms),
                    )
                }
            };

            if attempts >= max_attempts {
                break Err(failure);
            }

            warn!(
                "🔄 Retrying '{}' for {} after {:?}: {}",
                handler_name,
                event.event_type(),
                failure.0,
                failure.1
            );
            tokio::time::sleep(self.config.retry_delay(attempts)).await;
            attempt_event = attempt_event.retry();
        };

        let duration = started.elapsed();
        let failure_kind = outcome.as_ref().err().map(|(kind, _)| *kind);
        {
            let mut stats = self.stats.write().await;
            stats.record_invocation(&handler_name, duration, attempts, timeouts, failure_kind);
        }

        match outcome {
            Ok(output) => EventExecutionResult {
                handler_name,
                subscription_id: subscription.id,
                success: true,
                message: output.message,
                duration,
                attempts,
                failure: None,
                generated_events: output.generated_events,
            },
            Err((kind, message)) => {
                error!(
                    "❌ Handler '{}' failed for {} after {} attempt(s): {}",
                    handler_name,
                    event.event_type(),
                    attempts,
                    message
                );
                EventExecutionResult {
                    handler_name,
                    subscription_id: subscription.id,
                    success: false,
                    message: Some(message),
                    duration,
                    attempts,
                    failure: Some(kind),
                    generated_events: Vec::new(),
                }
            }
        }
    }
}
