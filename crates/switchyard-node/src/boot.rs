//! Node assembly and lifecycle.
//!
//! Registration happens entirely in [`Node::build`]; nothing is bound on
//! the bus once [`Node::run`] starts dispatching.

use crate::config::Config;
use crate::http::{self, AppState};
use crate::input::{InputError, InputService};
use crate::limiter::{DriveLimiter, KillSwitch};
use crate::topics::{
    self, DriveInput, GamepadButtonInput, GamepadButtonMessage, GamepadJoystickInput,
    GamepadJoystickMessage, GamepadTriggerInput, KeyboardInput, KeyboardMessage, LocomotionInput,
    PositionUpdate,
};
use crate::vehicle::traxxas::{self, Traxxas};
use crate::vehicle::{TcpVehicleLink, VehicleLink};
use anyhow::{Context, Result};
use std::sync::Arc;
use switchyard_core::{TopicBus, TopicRegistry};
use switchyard_gateway::{
    Connector, Gateway, MessageCatalog, WebSocketConfig, WebSocketConnector,
};
use tracing::{debug, error, info, warn};

/// Wire tag for drive frames.
pub const DRIVE_TAG: &str = "drive";
/// Wire tag for keyboard frames.
pub const KEYBOARD_TAG: &str = "keyboardinput";
/// Wire tag for gamepad button frames.
pub const GAMEPAD_BUTTON_TAG: &str = "gamepadbuttoninput";
/// Wire tag for gamepad stick frames.
pub const GAMEPAD_JOYSTICK_TAG: &str = "gamepadjoystickinput";
/// Wire tag for gamepad trigger frames.
pub const GAMEPAD_TRIGGER_TAG: &str = "gamepadtriggerinput";
/// Wire tag for locomotion frames.
pub const LOCOMOTION_TAG: &str = "locomotion";
/// Input name bound to the kill switch.
pub const KILL_SWITCH_INPUT: &str = "kill_switch";
/// Wire tag for position frames.
pub const POSITION_TAG: &str = "position";

/// A fully wired node.
pub struct Node {
    config: Config,
    registry: Arc<TopicRegistry>,
    bus: Arc<TopicBus>,
    inputs: Arc<InputService>,
    kill_switch: KillSwitch,
    gateway: Option<Gateway>,
}

impl Node {
    /// Build the node from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a topic name collides or the configured vehicle
    /// driver is unknown.
    pub fn build(config: Config) -> Result<Self> {
        let link: Arc<dyn VehicleLink> = Arc::new(TcpVehicleLink::new(
            config.vehicle.addr(),
            config.vehicle.connect_timeout(),
        ));
        let connector: Arc<dyn Connector> = Arc::new(WebSocketConnector::new(WebSocketConfig {
            url: config.gateway.url.clone(),
            encoding: config.gateway.encoding,
            ..Default::default()
        }));
        Self::assemble(config, link, connector)
    }

    fn assemble(
        config: Config,
        link: Arc<dyn VehicleLink>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let mut registry = TopicRegistry::new();
        topics::register(&mut registry).context("Failed to register core topics")?;

        let bus = Arc::new(TopicBus::with_config(config.bus.bus_config()));
        let kill_switch = KillSwitch::default();
        bus.use_middleware::<DriveInput, _>(kill_switch.clone());
        bus.use_middleware::<DriveInput, _>(DriveLimiter::new(
            config.vehicle.max_throttle,
            config.vehicle.max_steering,
        ));

        let inputs = Arc::new(InputService::new(config.input.clone()));
        bind_kill_switch(&inputs, &kill_switch)?;
        inputs.attach(&bus);

        match traxxas::driver_for(&config.vehicle.driver, link)? {
            Some(driver) => {
                Traxxas::register(&mut registry).context("Failed to register vehicle topics")?;
                driver.attach(&bus);
            }
            None => warn!("No vehicle driver configured, drive input goes nowhere"),
        }

        let gateway = if config.gateway.enabled {
            let gateway = Gateway::new(
                bus.clone(),
                catalog()?,
                connector,
                config.gateway.gateway_config(),
            );
            gateway.bind();
            Some(gateway)
        } else {
            info!("Gateway disabled");
            None
        };

        registry.log_discovered();
        let report = bus.report(&registry);
        for topic in &report.topics {
            info!(
                topic = %topic.name,
                middlewares = topic.middlewares,
                transformers = topic.transformers,
                subscribers = topic.subscribers,
                "Topic bound"
            );
        }

        Ok(Self {
            config,
            registry: Arc::new(registry),
            bus,
            inputs,
            kill_switch,
            gateway,
        })
    }

    /// The node's bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<TopicBus> {
        &self.bus
    }

    /// The node's kill switch.
    #[must_use]
    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    /// Start every service and run until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns an error if the diagnostics address is invalid or the
    /// shutdown signal cannot be installed.
    pub async fn run(self) -> Result<()> {
        if self.config.metrics.enabled {
            if let Err(e) = crate::metrics::start_metrics_server(self.config.metrics.port) {
                error!("Failed to start metrics server: {:#}", e);
            }
        }
        crate::metrics::describe_metrics();

        let gateway_stats = self.gateway.as_ref().map(Gateway::stats);

        if self.config.http.enabled {
            let addr = self.config.http.bind_addr()?;
            let state = Arc::new(AppState {
                bus: self.bus().clone(),
                registry: self.registry.clone(),
                inputs: self.inputs.clone(),
                gateway: gateway_stats,
            });
            tokio::spawn(async move {
                if let Err(e) = http::serve(addr, state).await {
                    error!("Diagnostics server failed: {:#}", e);
                }
            });
        }

        if let Some(gateway) = self.gateway {
            info!(url = %self.config.gateway.url, "Starting gateway");
            tokio::spawn(gateway.run());
        }

        info!("Switchyard node running");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl-c")?;
        info!("Shutting down");

        Ok(())
    }
}

/// Bind the kill switch to every device that configures it.
///
/// An input missing from `[input]` leaves that device unbound.
fn bind_kill_switch(inputs: &InputService, kill_switch: &KillSwitch) -> Result<()> {
    let switch = kill_switch.clone();
    match inputs.bind_keyboard(KILL_SWITCH_INPUT, move |state| switch.toggle(state)) {
        Ok(()) | Err(InputError::NotConfigured(_)) => {}
        Err(e) => return Err(e).context("Failed to bind kill switch"),
    }

    let switch = kill_switch.clone();
    match inputs.bind_button(KILL_SWITCH_INPUT, move |state| switch.toggle(state)) {
        Ok(()) | Err(InputError::NotConfigured(_)) => {}
        Err(e) => return Err(e).context("Failed to bind kill switch"),
    }

    debug!("Kill switch bound");
    Ok(())
}

/// The node's message catalog.
fn catalog() -> Result<MessageCatalog> {
    let mut catalog = MessageCatalog::new();
    catalog
        .inbound::<DriveInput>(DRIVE_TAG)?
        .inbound::<LocomotionInput>(LOCOMOTION_TAG)?
        .inbound::<GamepadTriggerInput>(GAMEPAD_TRIGGER_TAG)?
        .inbound_with::<KeyboardMessage, KeyboardInput, _>(KEYBOARD_TAG, KeyboardInput::from)?
        .inbound_with::<GamepadButtonMessage, GamepadButtonInput, _>(
            GAMEPAD_BUTTON_TAG,
            GamepadButtonInput::from,
        )?
        .inbound_with::<GamepadJoystickMessage, GamepadJoystickInput, _>(
            GAMEPAD_JOYSTICK_TAG,
            GamepadJoystickInput::from,
        )?
        .outbound::<PositionUpdate>(POSITION_TAG)?;
    Ok(catalog)
}
