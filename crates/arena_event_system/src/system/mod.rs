/// Event bus module - broken down into manageable components
mod core;
mod emitters;
mod handlers;
mod management;
mod outcome;
mod stats;

// Re-export all public items from submodules
pub use core::{EventBus, Subscription, SubscriptionId};
pub use outcome::{DispatchReport, EventExecutionResult};
pub use stats::{EventBusStats, HandlerStats};
