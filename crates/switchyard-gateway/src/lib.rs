//! # switchyard-gateway
//!
//! Bridges a remote control service onto the Switchyard topic bus.
//!
//! The gateway dials out through a [`Connector`], decodes inbound frames
//! with a [`MessageCatalog`] and dispatches them on the bus. Topics bound
//! as outbound in the catalog are sent back over the same link.
//!
//! - **WebSocket** - JSON text or MessagePack binary frames
//! - **Memory** - in-process links for tests and local tools
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchyard_gateway::{Gateway, GatewayConfig, MessageCatalog, WebSocketConnector};
//!
//! let mut catalog = MessageCatalog::new();
//! catalog.inbound::<DriveInput>("drive")?;
//! catalog.outbound::<PositionUpdate>("position")?;
//!
//! let connector = Arc::new(WebSocketConnector::with_url("ws://control.local/ws"));
//! let gateway = Gateway::new(bus.clone(), catalog, connector, GatewayConfig::default());
//! gateway.bind();
//! tokio::spawn(gateway.run());
//! ```

pub mod catalog;
pub mod gateway;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use catalog::MessageCatalog;
pub use gateway::{Gateway, GatewayConfig, GatewayStats, GatewayStatsSnapshot};
pub use memory::{MemoryConnector, MemoryLink};
pub use traits::{Connector, GatewayError, Link};

#[cfg(feature = "websocket")]
pub use websocket::{Encoding, WebSocketConfig, WebSocketConnector, WebSocketLink};
