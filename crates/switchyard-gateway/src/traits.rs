//! Link abstraction for the gateway.
//!
//! A [`Connector`] dials the remote control service and yields a [`Link`]
//! that moves whole [`Frame`]s in both directions. The gateway never
//! touches sockets directly, so any transport can sit underneath.

use async_trait::async_trait;
use switchyard_protocol::{Frame, ProtocolError};
use thiserror::Error;

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Dialing the remote service failed.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Link was closed.
    #[error("Link closed")]
    LinkClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The tag is already bound in the catalog.
    #[error("Message tag already registered: {0}")]
    DuplicateTag(String),
}

/// Dials the remote service.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new link.
    async fn connect(&self) -> Result<Box<dyn Link>, GatewayError>;

    /// Get the connector name (e.g., "websocket", "memory").
    fn name(&self) -> &'static str;
}

/// An open, bidirectional frame link.
#[async_trait]
pub trait Link: Send {
    /// Receive the next frame.
    ///
    /// Returns `None` if the link is closed cleanly. Must be cancel-safe:
    /// the gateway races it against outbound traffic.
    async fn recv(&mut self) -> Result<Option<Frame>, GatewayError>;

    /// Send a frame.
    async fn send(&mut self, frame: Frame) -> Result<(), GatewayError>;

    /// Remote address, if known.
    fn peer(&self) -> Option<String> {
        None
    }
}
