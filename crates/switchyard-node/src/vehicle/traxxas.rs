//! Traxxas driver.
//!
//! Turns generic [`DriveInput`] into ESC channel values and writes them to
//! the car's Wi-Fi receiver as fixed 11-byte packets:
//!
//! ```text
//! [85, 0, 11, 0, throttle, steering, brake, 0, 0, 0, checksum]
//! ```
//!
//! The checksum is the sum of the first ten bytes modulo 256.

use super::{DriverError, VehicleLink};
use crate::topics::DriveInput;
use async_trait::async_trait;
use std::sync::Arc;
use switchyard_core::{
    BoxError, RegistryError, Subscriber, Topic, TopicBus, TopicRegistry, Transformer,
};
use tracing::{info, trace};

/// Packet header bytes.
const HEADER: [u8; 4] = [85, 0, 11, 0];

/// Packet length in bytes.
pub const PACKET_LEN: usize = 11;

/// Channel values for the Traxxas ESC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscCommand {
    pub throttle: u8,
    pub steering: u8,
    pub brake: u8,
}

impl Topic for EscCommand {
    const NAME: &'static str = "TraxxasEscCommand";
}

impl EscCommand {
    /// Build the wire packet.
    #[must_use]
    pub fn packet(&self) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[..4].copy_from_slice(&HEADER);
        packet[4] = self.throttle;
        packet[5] = self.steering;
        packet[6] = self.brake;
        packet[10] = packet[..10]
            .iter()
            .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
        packet
    }
}

impl From<&DriveInput> for EscCommand {
    fn from(drive: &DriveInput) -> Self {
        // Low byte of each input; the receiver does not use the brake channel.
        Self {
            throttle: (drive.throttle & 0xff) as u8,
            steering: (drive.steering & 0xff) as u8,
            brake: 0,
        }
    }
}

/// Transformer from [`DriveInput`] to [`EscCommand`].
pub struct EscTransformer;

#[async_trait]
impl Transformer<DriveInput> for EscTransformer {
    type Output = EscCommand;

    async fn transform(&self, drive: &DriveInput) -> Result<EscCommand, BoxError> {
        Ok(EscCommand::from(drive))
    }
}

/// Subscriber writing [`EscCommand`] packets to the vehicle.
pub struct EscWriter {
    link: Arc<dyn VehicleLink>,
}

impl EscWriter {
    /// Write through `link`.
    #[must_use]
    pub fn new(link: Arc<dyn VehicleLink>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl Subscriber<EscCommand> for EscWriter {
    async fn handle(&self, command: &EscCommand) -> Result<(), BoxError> {
        let packet = command.packet();
        trace!(?packet, "Sending ESC packet");
        self.link.send(&packet).await?;
        crate::metrics::record_vehicle_packet();
        Ok(())
    }
}

/// The Traxxas driver.
pub struct Traxxas {
    link: Arc<dyn VehicleLink>,
}

impl Traxxas {
    /// Create a driver writing to `link`.
    #[must_use]
    pub fn new(link: Arc<dyn VehicleLink>) -> Self {
        Self { link }
    }

    /// Register the driver's topics.
    ///
    /// # Errors
    ///
    /// Returns an error if another type already uses [`EscCommand::NAME`].
    pub fn register(registry: &mut TopicRegistry) -> Result<(), RegistryError> {
        registry.register::<EscCommand>()
    }

    /// Bind the transformer and packet writer on `bus`.
    pub fn attach(&self, bus: &TopicBus) {
        bus.use_transformer::<DriveInput, _>(EscTransformer);
        bus.subscribe::<EscCommand, _>(EscWriter::new(self.link.clone()));
        info!("Traxxas is ready");
    }
}

/// Build the driver named `name`, if any.
///
/// # Errors
///
/// Returns an error for names with no driver.
pub fn driver_for(name: &str, link: Arc<dyn VehicleLink>) -> Result<Option<Traxxas>, DriverError> {
    match name {
        "traxxas" => Ok(Some(Traxxas::new(link))),
        "none" => Ok(None),
        other => Err(DriverError::UnknownDriver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::RecordingLink;

    #[test]
    fn test_packet_layout_and_checksum() {
        let command = EscCommand {
            throttle: 100,
            steering: 200,
            brake: 0,
        };
        // 85 + 11 + 100 + 200 = 396 -> 140
        assert_eq!(command.packet(), [85, 0, 11, 0, 100, 200, 0, 0, 0, 0, 140]);
    }

    #[test]
    fn test_channels_use_low_byte() {
        let command = EscCommand::from(&DriveInput {
            throttle: 0x1_2c,
            steering: -1,
            brake: true,
        });
        assert_eq!(
            command,
            EscCommand {
                throttle: 0x2c,
                steering: 0xff,
                brake: 0
            }
        );
    }

    #[tokio::test]
    async fn test_drive_input_reaches_vehicle() {
        let bus = TopicBus::new();
        let link = Arc::new(RecordingLink::default());
        Traxxas::new(link.clone()).attach(&bus);

        bus.publish(DriveInput {
            throttle: 10,
            steering: 20,
            brake: false,
        })
        .await
        .unwrap();

        assert_eq!(
            link.packets(),
            vec![vec![85, 0, 11, 0, 10, 20, 0, 0, 0, 0, 126]]
        );
    }

    #[test]
    fn test_driver_lookup() {
        let link: Arc<dyn VehicleLink> = Arc::new(RecordingLink::default());
        assert!(driver_for("traxxas", link.clone()).unwrap().is_some());
        assert!(driver_for("none", link.clone()).unwrap().is_none());
        assert!(matches!(
            driver_for("tesla", link),
            Err(DriverError::UnknownDriver(_))
        ));
    }
}
