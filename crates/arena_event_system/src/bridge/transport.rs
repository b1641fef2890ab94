//! Real-time transport collaborator.
//!
//! Bridges never talk to sockets directly. They hand `(channel, payload)`
//! pairs to a [`Transport`]; the server decides how channels map onto
//! connections.

use crate::error::TransportError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Broadcasts JSON payloads to named channels.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `payload` to every subscriber of `channel`.
    ///
    /// A channel with no subscribers is not an error.
    async fn broadcast(&self, channel: &str, payload: &Value) -> Result<(), TransportError>;
}

/// In-process transport backed by one `tokio::sync::broadcast` sender per
/// channel.
///
/// Besides per-channel receivers it offers a [`tap`](ChannelTransport::tap)
/// that observes every `(channel, payload)` pair, which the console uses to
/// print outbound traffic.
pub struct ChannelTransport {
    channels: DashMap<String, broadcast::Sender<Value>>,
    tap: broadcast::Sender<(String, Value)>,
    capacity: usize,
    closed: AtomicBool,
}

impl std::fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("channels", &self.channels.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ChannelTransport {
    /// Creates a transport whose channels buffer up to `capacity` payloads
    /// per lagging receiver.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tap, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            tap,
            capacity,
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribes to a single channel, creating it if needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Value> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Observes every payload sent through this transport.
    pub fn tap(&self) -> broadcast::Receiver<(String, Value)> {
        self.tap.subscribe()
    }

    /// Number of channels somebody subscribed to at least once.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Rejects all further broadcasts.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("🔌 Channel transport closed");
    }

    fn validate_channel(channel: &str) -> Result<(), TransportError> {
        if channel.is_empty() || channel.chars().any(char::is_whitespace) {
            return Err(TransportError::InvalidChannel(channel.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn broadcast(&self, channel: &str, payload: &Value) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("transport closed".to_string()));
        }
        Self::validate_channel(channel)?;

        let receivers = match self.channels.get(channel) {
            // send only fails when nobody listens
            Some(sender) => sender.send(payload.clone()).unwrap_or(0),
            None => 0,
        };
        let _ = self.tap.send((channel.to_string(), payload.clone()));

        trace!("📡 {} -> {} receiver(s)", channel, receivers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_reaches_channel_subscribers_and_tap() {
        let transport = ChannelTransport::new(8);
        let mut lobby = transport.subscribe("lobby.1");
        let mut other = transport.subscribe("lobby.2");
        let mut tap = transport.tap();

        transport
            .broadcast("lobby.1", &json!({"type": "lobby.created"}))
            .await
            .unwrap();

        assert_eq!(lobby.recv().await.unwrap()["type"], "lobby.created");
        assert!(other.try_recv().is_err());
        let (channel, payload) = tap.recv().await.unwrap();
        assert_eq!(channel, "lobby.1");
        assert_eq!(payload["type"], "lobby.created");
    }

    #[tokio::test]
    async fn test_zero_subscribers_is_ok() {
        let transport = ChannelTransport::default();
        assert!(transport.broadcast("lobbies", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_channel_and_closed_transport() {
        let transport = ChannelTransport::default();
        assert!(matches!(
            transport.broadcast("", &json!({})).await,
            Err(TransportError::InvalidChannel(_))
        ));
        assert!(matches!(
            transport.broadcast("has space", &json!({})).await,
            Err(TransportError::InvalidChannel(_))
        ));

        transport.close();
        assert!(matches!(
            transport.broadcast("lobbies", &json!({})).await,
            Err(TransportError::Unavailable(_))
        ));
    }
}
