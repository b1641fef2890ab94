//! Handler trait for processing events.
//!
//! Handlers are registered on the [`crate::EventBus`] per event type. Most
//! code uses [`FnHandler`] to wrap an async closure; types with their own
//! state (such as the bridge registry) implement [`EventHandler`] directly.

use crate::error::HandlerError;
use crate::events::EventEnvelope;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Successful result of a single handler invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    /// Optional human-readable note recorded in the execution result
    pub message: Option<String>,
    /// Events raised by the handler; published after the current dispatch
    /// completes, never re-entrantly
    pub generated_events: Vec<EventEnvelope>,
}

impl HandlerOutput {
    /// A successful outcome with nothing to report.
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            generated_events: Vec::new(),
        }
    }

    /// Queues an event for publication once the current dispatch is over.
    pub fn emit(mut self, event: EventEnvelope) -> Self {
        self.generated_events.push(event);
        self
    }
}

/// Result type returned by event handlers.
pub type HandlerResult = Result<HandlerOutput, HandlerError>;

/// Handler trait for processing events asynchronously.
///
/// The bus calls [`EventHandler::handle`] once per attempt. An attempt that
/// exceeds the configured timeout is dropped, so implementations must be
/// cancellation safe: anything they commit before their final `.await`
/// point may be observed again on retry.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one delivery attempt of `event`.
    async fn handle(&self, event: &EventEnvelope) -> HandlerResult;

    /// Returns a human-readable name for this handler, used in results,
    /// statistics and logs.
    fn handler_name(&self) -> &str;
}

/// Adapter turning an async closure into an [`EventHandler`].
///
/// The closure receives an owned clone of the envelope so it can move it
/// into the returned future.
///
/// # Examples
///
/// ```rust
/// use arena_event_system::{FnHandler, HandlerOutput};
///
/// let handler = FnHandler::new("audit", |event| async move {
///     Ok(HandlerOutput::with_message(format!("saw {}", event.event_type())))
/// });
/// ```
pub struct FnHandler<F, Fut>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    name: String,
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F, Fut>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, event: &EventEnvelope) -> HandlerResult {
        (self.handler)(event.clone()).await
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}
