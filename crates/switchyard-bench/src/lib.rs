//! Shared fixtures for the Switchyard benchmarks.

use serde::{Deserialize, Serialize};
use switchyard_core::{Flow, Topic, TopicBus};

/// Drive-shaped topic used by every benchmark.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Drive {
    pub throttle: i32,
    pub steering: i32,
    pub brake: bool,
}

impl Topic for Drive {
    const NAME: &'static str = "Drive";
}

/// Derived topic for transformer benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct Channels(pub u8, pub u8);

impl Topic for Channels {
    const NAME: &'static str = "Channels";
}

/// A bus with `middlewares` clamping middleware and `subscribers` no-op
/// subscribers on [`Drive`].
#[must_use]
pub fn drive_bus(middlewares: usize, subscribers: usize) -> TopicBus {
    let bus = TopicBus::new();
    for _ in 0..middlewares {
        bus.use_middleware_fn(|d: &mut Drive| {
            d.throttle = d.throttle.clamp(-255, 255);
            Ok(Flow::Continue)
        });
    }
    for _ in 0..subscribers {
        bus.subscribe_fn(|_: &Drive| Ok(()));
    }
    bus
}

/// Add a [`Drive`] -> [`Channels`] transformer and a [`Channels`] subscriber.
pub fn with_transformer(bus: &TopicBus) {
    bus.use_transformer_fn(|d: &Drive| Ok(Channels(d.throttle as u8, d.steering as u8)));
    bus.subscribe_fn(|_: &Channels| Ok(()));
}
