//! In-process links.
//!
//! Used by tests and by tools that drive a node from the same process.

use crate::traits::{Connector, GatewayError, Link};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use switchyard_protocol::Frame;
use tokio::sync::mpsc;

/// One end of an in-process link.
pub struct MemoryLink {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryLink {
    /// Create a connected pair of links.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }
}

#[async_trait]
impl Link for MemoryLink {
    async fn recv(&mut self) -> Result<Option<Frame>, GatewayError> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, frame: Frame) -> Result<(), GatewayError> {
        self.tx.send(frame).map_err(|_| GatewayError::LinkClosed)
    }

    fn peer(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

/// Connector handing out queued [`MemoryLink`]s, one per connect.
///
/// Connecting with an empty queue fails, which exercises the gateway's
/// reconnect path.
#[derive(Default)]
pub struct MemoryConnector {
    links: Mutex<VecDeque<MemoryLink>>,
}

impl MemoryConnector {
    /// Create a connector with no queued links.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a link and return the remote end.
    pub fn push_link(&self) -> MemoryLink {
        let (local, remote) = MemoryLink::pair();
        if let Ok(mut links) = self.links.lock() {
            links.push_back(local);
        }
        remote
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, GatewayError> {
        let link = self
            .links
            .lock()
            .map_err(|_| GatewayError::ConnectFailed("connector poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| GatewayError::ConnectFailed("no link queued".to_string()))?;
        Ok(Box::new(link))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_link_pair() {
        let (mut a, mut b) = MemoryLink::pair();
        a.send(Frame::authorize("t")).await.unwrap();
        assert_eq!(b.recv().await.unwrap().unwrap(), Frame::authorize("t"));

        drop(a);
        assert!(b.recv().await.unwrap().is_none());
        assert!(matches!(
            b.send(Frame::authorize("t")).await,
            Err(GatewayError::LinkClosed)
        ));
    }

    #[tokio::test]
    async fn test_memory_connector_queue() {
        let connector = MemoryConnector::new();
        assert!(connector.connect().await.is_err());

        let _remote = connector.push_link();
        assert!(connector.connect().await.is_ok());
        assert!(connector.connect().await.is_err());
    }
}
