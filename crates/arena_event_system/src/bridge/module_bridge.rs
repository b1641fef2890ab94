//! The per-domain bridge trait and its default payload shape.

use crate::error::BridgeError;
use crate::events::EventEnvelope;
use serde_json::{Map, Value};

/// Default bridge priority; lower values are listed first.
pub const DEFAULT_BRIDGE_PRIORITY: i32 = 100;

/// Forwards events of one domain module to transport channels.
///
/// A bridge is pure routing: it decides *where* an event goes
/// ([`channels`](ModuleBridge::channels)) and *what* is sent
/// ([`transform`](ModuleBridge::transform)). The [`crate::BridgeRegistry`]
/// does the sending.
///
/// # Examples
///
/// ```rust
/// use arena_event_system::{EventEnvelope, ModuleBridge};
///
/// struct ChatBridge;
///
/// impl ModuleBridge for ChatBridge {
///     fn module_name(&self) -> &str {
///         "chat"
///     }
///
///     fn channels(&self, _event: &EventEnvelope) -> Vec<String> {
///         vec!["chat.global".to_string()]
///     }
/// }
///
/// let event = EventEnvelope::custom("chat.message", serde_json::json!({"text": "gg"})).unwrap();
/// assert!(ChatBridge.can_handle(&event));
/// ```
pub trait ModuleBridge: Send + Sync {
    /// Module prefix this bridge serves, e.g. `lobby`.
    fn module_name(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_BRIDGE_PRIORITY
    }

    /// Whether this bridge forwards `event`. Defaults to a module prefix match.
    fn can_handle(&self, event: &EventEnvelope) -> bool {
        event.module() == self.module_name()
    }

    /// Target channels for `event`. An empty list means the event is not
    /// forwarded anywhere.
    fn channels(&self, event: &EventEnvelope) -> Vec<String>;

    /// Outbound payload for `event`. Defaults to [`default_payload`].
    fn transform(&self, event: &EventEnvelope) -> Result<Value, BridgeError> {
        default_payload(event)
    }
}

/// Flattens an envelope into the outbound JSON shape.
///
/// The result carries `type`, `id`, `timestamp` and `correlation_id`
/// alongside the payload fields. The internal `kind` tag is dropped.
pub fn default_payload(event: &EventEnvelope) -> Result<Value, BridgeError> {
    let payload = serde_json::to_value(event.payload()).map_err(|e| BridgeError::Transform {
        event_type: event.event_type().to_string(),
        reason: e.to_string(),
    })?;

    let mut object = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    object.remove("kind");
    object.insert("type".to_string(), Value::String(event.event_type().to_string()));
    object.insert("id".to_string(), Value::String(event.id().to_string()));
    object.insert("timestamp".to_string(), Value::from(event.timestamp()));
    object.insert(
        "correlation_id".to_string(),
        Value::String(event.correlation_id().to_string()),
    );

    Ok(Value::Object(object))
}
