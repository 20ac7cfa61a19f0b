//! Vehicle drivers and the links they write to.

pub mod traxxas;

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Vehicle link errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Could not reach the vehicle receiver.
    #[error("Failed to connect to vehicle at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The receiver did not accept the connection in time.
    #[error("Timed out after {after:?} connecting to vehicle at {addr}")]
    Timeout { addr: String, after: Duration },

    /// Writing to the receiver failed.
    #[error("Vehicle I/O error: {0}")]
    Io(#[from] io::Error),

    /// Driver name not known.
    #[error("Unknown vehicle driver: {0}")]
    UnknownDriver(String),
}

/// Byte sink in front of a vehicle receiver.
#[async_trait]
pub trait VehicleLink: Send + Sync {
    /// Write one complete packet.
    async fn send(&self, packet: &[u8]) -> Result<(), DriverError>;
}

/// TCP connection to a vehicle receiver.
///
/// Connects on first use and again after any write failure. A connect
/// that takes longer than the timeout fails the packet, so an unreachable
/// vehicle cannot hold up the caller.
pub struct TcpVehicleLink {
    addr: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpVehicleLink {
    /// Create a link to `addr`. Nothing is dialed until the first packet.
    #[must_use]
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            stream: Mutex::new(None),
        }
    }
}

async fn dial<F>(addr: &str, limit: Duration, connect: F) -> Result<TcpStream, DriverError>
where
    F: Future<Output = io::Result<TcpStream>>,
{
    match tokio::time::timeout(limit, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(DriverError::Connect {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(DriverError::Timeout {
            addr: addr.to_string(),
            after: limit,
        }),
    }
}

#[async_trait]
impl VehicleLink for TcpVehicleLink {
    async fn send(&self, packet: &[u8]) -> Result<(), DriverError> {
        let mut guard = self.stream.lock().await;

        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => {
                let stream = dial(
                    &self.addr,
                    self.connect_timeout,
                    TcpStream::connect(self.addr.as_str()),
                )
                .await?;
                stream.set_nodelay(true)?;
                info!(addr = %self.addr, "Vehicle connected");
                stream
            }
        };

        if let Err(e) = stream.write_all(packet).await {
            warn!(addr = %self.addr, error = %e, "Vehicle write failed, dropping connection");
            return Err(e.into());
        }
        *guard = Some(stream);

        debug!(addr = %self.addr, bytes = packet.len(), "Packet written");
        Ok(())
    }
}

/// Link that keeps every packet in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingLink {
    packets: std::sync::Mutex<Vec<Vec<u8>>>,
}

#[cfg(test)]
impl RecordingLink {
    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl VehicleLink for RecordingLink {
    async fn send(&self, packet: &[u8]) -> Result<(), DriverError> {
        self.packets.lock().unwrap().push(packet.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_link_connects_lazily() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let link = TcpVehicleLink::new(
            listener.local_addr().unwrap().to_string(),
            Duration::from_secs(1),
        );

        let (sent, accepted) = tokio::join!(link.send(&[1, 2, 3]), listener.accept());
        sent.unwrap();

        let (mut peer, _) = accepted.unwrap();
        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_tcp_link_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let link = TcpVehicleLink::new(addr, Duration::from_secs(1));
        assert!(matches!(
            link.send(&[0]).await,
            Err(DriverError::Connect { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dial_gives_up_after_timeout() {
        let started = tokio::time::Instant::now();
        let result = dial(
            "10.255.255.1:6000",
            Duration::from_millis(200),
            std::future::pending(),
        )
        .await;

        match result {
            Err(DriverError::Timeout { addr, after }) => {
                assert_eq!(addr, "10.255.255.1:6000");
                assert_eq!(after, Duration::from_millis(200));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
