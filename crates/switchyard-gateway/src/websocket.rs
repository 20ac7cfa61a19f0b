//! WebSocket client link.
//!
//! Text messages carry JSON frames; binary messages carry length-prefixed
//! MessagePack frames. Outgoing frames use the configured [`Encoding`].

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use switchyard_protocol::{codec, Frame, ProtocolError};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, warn};

use crate::traits::{Connector, GatewayError, Link};

/// Wire encoding for outgoing frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// JSON text messages.
    #[default]
    Text,
    /// Length-prefixed MessagePack binary messages.
    Binary,
}

/// WebSocket connector configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Service URL, `ws://` or `wss://`.
    pub url: String,
    /// Encoding for outgoing frames.
    pub encoding: Encoding,
    /// Maximum message size in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            encoding: Encoding::Text,
            max_message_size: 64 * 1024, // 64 KB
        }
    }
}

/// Dials a WebSocket server.
pub struct WebSocketConnector {
    config: WebSocketConfig,
}

impl WebSocketConnector {
    /// Create a connector.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Create a connector for `url` with default settings.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WebSocketConfig {
            url: url.into(),
            ..Default::default()
        })
    }

    /// The configured URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, GatewayError> {
        let (stream, response) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| GatewayError::ConnectFailed(format!("{}: {}", self.config.url, e)))?;

        debug!(
            url = %self.config.url,
            status = %response.status(),
            "WebSocket handshake completed"
        );

        Ok(Box::new(WebSocketLink {
            stream,
            url: self.config.url.clone(),
            encoding: self.config.encoding,
            max_message_size: self.config.max_message_size,
            read_buffer: BytesMut::with_capacity(4096),
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// An open WebSocket client link.
pub struct WebSocketLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    encoding: Encoding,
    max_message_size: usize,
    read_buffer: BytesMut,
}

impl WebSocketLink {
    /// Decode the next buffered binary frame. A corrupt buffer is discarded
    /// so the error is reported once.
    fn take_buffered(&mut self) -> Result<Option<Frame>, GatewayError> {
        codec::decode_from(&mut self.read_buffer).map_err(|e| {
            self.read_buffer.clear();
            e.into()
        })
    }
}

#[async_trait]
impl Link for WebSocketLink {
    async fn recv(&mut self) -> Result<Option<Frame>, GatewayError> {
        // Binary messages may carry more than one frame
        if let Some(frame) = self.take_buffered()? {
            return Ok(Some(frame));
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > self.max_message_size {
                        return Err(ProtocolError::FrameTooLarge(text.len()).into());
                    }
                    return Ok(Some(codec::decode_text(&text)?));
                }
                Some(Ok(Message::Binary(data))) => {
                    if data.len() > self.max_message_size {
                        warn!(
                            "Message too large: {} bytes (max: {})",
                            data.len(),
                            self.max_message_size
                        );
                        return Err(ProtocolError::FrameTooLarge(data.len()).into());
                    }

                    self.read_buffer.extend_from_slice(&data);
                    if let Some(frame) = self.take_buffered()? {
                        return Ok(Some(frame));
                    }
                }
                // tungstenite queues the pong itself and flushes it on the
                // next read or write
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    debug!(url = %self.url, "Received close frame");
                    return Ok(None);
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    debug!(url = %self.url, "WebSocket stream ended");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    error!(url = %self.url, "WebSocket error: {}", e);
                    return Err(GatewayError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), GatewayError> {
        let message = match self.encoding {
            Encoding::Text => Message::Text(codec::encode_text(&frame)?),
            Encoding::Binary => Message::Binary(codec::encode(&frame)?.to_vec()),
        };

        self.stream
            .send(message)
            .await
            .map_err(|e| GatewayError::SendFailed(e.to_string()))
    }

    fn peer(&self) -> Option<String> {
        Some(self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_config_default() {
        let config = WebSocketConfig::default();
        assert_eq!(config.encoding, Encoding::Text);
        assert_eq!(config.max_message_size, 64 * 1024);
    }

    #[test]
    fn test_encoding_from_config_value() {
        let encoding: Encoding = serde_json::from_str("\"binary\"").unwrap();
        assert_eq!(encoding, Encoding::Binary);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let connector = WebSocketConnector::with_url("ws://127.0.0.1:1/ws");
        assert_eq!(connector.url(), "ws://127.0.0.1:1/ws");
        assert!(matches!(
            connector.connect().await,
            Err(GatewayError::ConnectFailed(_))
        ));
    }
}
