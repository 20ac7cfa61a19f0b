//! Drive input limiting.

use crate::topics::{DriveInput, InputState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchyard_core::{BoxError, Flow, Middleware};
use tracing::{info, trace};

/// Clamps throttle and steering to a configured magnitude before any
/// driver sees them.
#[derive(Debug, Clone, Copy)]
pub struct DriveLimiter {
    max_throttle: i32,
    max_steering: i32,
}

impl DriveLimiter {
    /// Create a limiter. Negative limits are treated as zero.
    #[must_use]
    pub fn new(max_throttle: i32, max_steering: i32) -> Self {
        Self {
            max_throttle: max_throttle.max(0),
            max_steering: max_steering.max(0),
        }
    }
}

#[async_trait]
impl Middleware<DriveInput> for DriveLimiter {
    async fn process(&self, drive: &mut DriveInput) -> Result<Flow, BoxError> {
        let throttle = drive.throttle.clamp(-self.max_throttle, self.max_throttle);
        let steering = drive.steering.clamp(-self.max_steering, self.max_steering);

        if (throttle, steering) != (drive.throttle, drive.steering) {
            trace!(
                throttle = drive.throttle,
                steering = drive.steering,
                "Clamped drive input"
            );
        }

        drive.throttle = throttle;
        drive.steering = steering;
        Ok(Flow::Continue)
    }
}

/// Operator kill switch.
///
/// While engaged, every drive input is rewritten to a braked stop. Clones
/// share one latch, so the copy bound to an input toggles the copy on the
/// bus.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    engaged: Arc<AtomicBool>,
}

impl KillSwitch {
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Relaxed)
    }

    /// Flip the latch on each press; releases are ignored.
    pub fn toggle(&self, state: InputState) {
        if state == InputState::Pressed {
            let engaged = !self.engaged.fetch_xor(true, Ordering::Relaxed);
            info!(engaged, "Kill switch toggled");
        }
    }
}

#[async_trait]
impl Middleware<DriveInput> for KillSwitch {
    async fn process(&self, drive: &mut DriveInput) -> Result<Flow, BoxError> {
        if self.is_engaged() {
            trace!(throttle = drive.throttle, "Kill switch engaged, stopping");
            *drive = DriveInput {
                throttle: 0,
                steering: 0,
                brake: true,
            };
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clamps_both_directions() {
        let limiter = DriveLimiter::new(100, 50);
        let mut drive = DriveInput {
            throttle: 180,
            steering: -90,
            brake: false,
        };

        assert_eq!(limiter.process(&mut drive).await.unwrap(), Flow::Continue);
        assert_eq!(drive.throttle, 100);
        assert_eq!(drive.steering, -50);
    }

    #[tokio::test]
    async fn test_within_limits_untouched() {
        let limiter = DriveLimiter::new(100, 100);
        let mut drive = DriveInput {
            throttle: 42,
            steering: -7,
            brake: true,
        };

        limiter.process(&mut drive).await.unwrap();
        assert_eq!(
            drive,
            DriveInput {
                throttle: 42,
                steering: -7,
                brake: true
            }
        );
    }

    #[tokio::test]
    async fn test_negative_limit_stops_vehicle() {
        let limiter = DriveLimiter::new(-5, 0);
        let mut drive = DriveInput {
            throttle: 10,
            steering: 10,
            brake: false,
        };

        limiter.process(&mut drive).await.unwrap();
        assert_eq!((drive.throttle, drive.steering), (0, 0));
    }

    #[tokio::test]
    async fn test_kill_switch_latches_on_press() {
        let switch = KillSwitch::default();
        let bound = switch.clone();
        let mut drive = DriveInput {
            throttle: 30,
            steering: 4,
            brake: false,
        };

        switch.process(&mut drive).await.unwrap();
        assert_eq!(drive.throttle, 30);

        bound.toggle(InputState::Pressed);
        bound.toggle(InputState::Released);
        assert!(switch.is_engaged());
        assert_eq!(switch.process(&mut drive).await.unwrap(), Flow::Continue);
        assert_eq!(
            drive,
            DriveInput {
                throttle: 0,
                steering: 0,
                brake: true
            }
        );

        bound.toggle(InputState::Pressed);
        assert!(!switch.is_engaged());
    }
}
