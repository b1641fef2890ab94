//! # Module Bridges
//!
//! Bridges carry bus events out of the process. Each domain module (`lobby`,
//! `game`, ...) gets one [`ModuleBridge`] that picks target channels and
//! shapes the outbound JSON; the [`BridgeRegistry`] subscribes on the bus and
//! fans matching events out through a [`Transport`].
//!
//! ```text
//! EventBus ──► BridgeRegistry ──► LobbyBridge ──► Transport("lobby.<id>", "lobbies")
//!                            └──► GameBridge  ──► Transport("game.<session>")
//! ```

mod game_bridge;
mod lobby_bridge;
mod module_bridge;
mod registry;
mod transport;

pub use game_bridge::{game_channel, GameBridge};
pub use lobby_bridge::{lobby_channel, LobbyBridge, LOBBY_LIST_CHANNEL, PRIVATE_LOBBY_TAG};
pub use module_bridge::{default_payload, ModuleBridge, DEFAULT_BRIDGE_PRIORITY};
pub use registry::{BridgeDelivery, BridgeRegistry, BroadcastReport, BRIDGE_HANDLER_PRIORITY};
pub use transport::{ChannelTransport, Transport};
