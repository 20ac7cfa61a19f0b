//! Named operator input bindings.
//!
//! The control service sends raw keyboard and gamepad events. Components
//! claim an input by name during registration; the [`InputService`] then
//! routes every matching event to the one handler bound to that name.
//! Names must appear in the `[input]` config section, and each name can be
//! bound once per device kind.

use crate::config::InputSection;
use crate::topics::{
    GamepadButtonInput, GamepadJoystickInput, GamepadTriggerInput, InputState, KeyboardInput,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchyard_core::TopicBus;
use thiserror::Error;
use tracing::{debug, trace};

/// Input binding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// Another component already claimed the input.
    #[error("Input {0} is already bound")]
    AlreadyBound(String),

    /// The input name is missing from the `[input]` section.
    #[error("Input {0} is not configured")]
    NotConfigured(String),
}

/// Position of a gamepad stick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickState {
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
}

type Handler<A> = Box<dyn Fn(A) + Send + Sync>;

/// Routes input topics to named bindings.
pub struct InputService {
    config: InputSection,
    keyboard: DashMap<String, Handler<InputState>>,
    buttons: DashMap<String, Handler<InputState>>,
    joysticks: DashMap<String, Handler<JoystickState>>,
    triggers: DashMap<String, Handler<f32>>,
}

/// Configured inputs, as served to the control service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputCatalog {
    pub keyboard: BTreeMap<String, String>,
    pub gamepad: BTreeMap<String, u8>,
}

impl InputService {
    #[must_use]
    pub fn new(config: InputSection) -> Self {
        Self {
            config,
            keyboard: DashMap::new(),
            buttons: DashMap::new(),
            joysticks: DashMap::new(),
            triggers: DashMap::new(),
        }
    }

    /// Bind a keyboard input.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a configured keyboard input or is
    /// already bound.
    pub fn bind_keyboard<F>(&self, name: &str, handler: F) -> Result<(), InputError>
    where
        F: Fn(InputState) + Send + Sync + 'static,
    {
        if !self.config.keyboard.contains_key(name) {
            return Err(InputError::NotConfigured(name.to_string()));
        }
        claim(&self.keyboard, name, Box::new(handler))
    }

    /// Bind a gamepad button.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a configured gamepad input or is
    /// already bound as a button.
    pub fn bind_button<F>(&self, name: &str, handler: F) -> Result<(), InputError>
    where
        F: Fn(InputState) + Send + Sync + 'static,
    {
        self.check_gamepad(name)?;
        claim(&self.buttons, name, Box::new(handler))
    }

    /// Bind a gamepad stick.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a configured gamepad input or is
    /// already bound as a stick.
    pub fn bind_joystick<F>(&self, name: &str, handler: F) -> Result<(), InputError>
    where
        F: Fn(JoystickState) + Send + Sync + 'static,
    {
        self.check_gamepad(name)?;
        claim(&self.joysticks, name, Box::new(handler))
    }

    /// Bind a gamepad trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a configured gamepad input or is
    /// already bound as a trigger.
    pub fn bind_trigger<F>(&self, name: &str, handler: F) -> Result<(), InputError>
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.check_gamepad(name)?;
        claim(&self.triggers, name, Box::new(handler))
    }

    fn check_gamepad(&self, name: &str) -> Result<(), InputError> {
        if self.config.gamepad.contains_key(name) {
            Ok(())
        } else {
            Err(InputError::NotConfigured(name.to_string()))
        }
    }

    /// Configured input names and their default controls.
    #[must_use]
    pub fn catalog(&self) -> InputCatalog {
        InputCatalog {
            keyboard: self.config.keyboard.clone(),
            gamepad: self.config.gamepad.clone(),
        }
    }

    /// Subscribe the service to the four input topics on `bus`.
    ///
    /// Events for names nobody bound are ignored.
    pub fn attach(self: &Arc<Self>, bus: &TopicBus) {
        let service = self.clone();
        bus.subscribe_fn(move |key: &KeyboardInput| {
            emit(&service.keyboard, &key.name, InputState::from(key.pressed));
            Ok(())
        });

        let service = self.clone();
        bus.subscribe_fn(move |button: &GamepadButtonInput| {
            emit(&service.buttons, &button.name, button.state);
            Ok(())
        });

        let service = self.clone();
        bus.subscribe_fn(move |stick: &GamepadJoystickInput| {
            let state = JoystickState {
                pressed: stick.pressed,
                x: stick.x,
                y: stick.y,
            };
            emit(&service.joysticks, &stick.name, state);
            Ok(())
        });

        let service = self.clone();
        bus.subscribe_fn(move |trigger: &GamepadTriggerInput| {
            emit(&service.triggers, &trigger.name, trigger.value);
            Ok(())
        });

        debug!(
            keyboard = self.keyboard.len(),
            buttons = self.buttons.len(),
            joysticks = self.joysticks.len(),
            triggers = self.triggers.len(),
            "Input service attached"
        );
    }
}

fn claim<A>(
    map: &DashMap<String, Handler<A>>,
    name: &str,
    handler: Handler<A>,
) -> Result<(), InputError> {
    match map.entry(name.to_string()) {
        Entry::Occupied(_) => Err(InputError::AlreadyBound(name.to_string())),
        Entry::Vacant(slot) => {
            slot.insert(handler);
            debug!(input = %name, "Input bound");
            Ok(())
        }
    }
}

// Handlers run under the shard read lock and must not bind inputs.
fn emit<A>(map: &DashMap<String, Handler<A>>, name: &str, value: A) {
    match map.get(name) {
        Some(handler) => (handler.value())(value),
        None => trace!(input = %name, "No binding for input"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn config() -> InputSection {
        InputSection {
            keyboard: BTreeMap::from([
                ("horn".to_string(), "KeyH".to_string()),
                ("lights".to_string(), "KeyL".to_string()),
            ]),
            gamepad: BTreeMap::from([("steer".to_string(), 0), ("throttle".to_string(), 7)]),
        }
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let inputs = InputService::new(config());
        inputs.bind_keyboard("horn", |_| {}).unwrap();

        assert_eq!(
            inputs.bind_keyboard("horn", |_| {}),
            Err(InputError::AlreadyBound("horn".to_string()))
        );

        // Device kinds are separate namespaces.
        inputs.bind_trigger("throttle", |_| {}).unwrap();
        inputs.bind_button("throttle", |_| {}).unwrap();
        assert_eq!(
            inputs.bind_trigger("throttle", |_| {}),
            Err(InputError::AlreadyBound("throttle".to_string()))
        );
    }

    #[test]
    fn test_unconfigured_input_rejected() {
        let inputs = InputService::new(config());

        assert_eq!(
            inputs.bind_keyboard("turbo", |_| {}),
            Err(InputError::NotConfigured("turbo".to_string()))
        );
        // Gamepad names are not keyboard names.
        assert_eq!(
            inputs.bind_keyboard("steer", |_| {}),
            Err(InputError::NotConfigured("steer".to_string()))
        );
        assert_eq!(
            inputs.bind_joystick("horn", |_| {}),
            Err(InputError::NotConfigured("horn".to_string()))
        );
    }

    #[tokio::test]
    async fn test_events_reach_their_binding() {
        let bus = TopicBus::new();
        let inputs = Arc::new(InputService::new(config()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        inputs
            .bind_keyboard("horn", move |state| s.lock().unwrap().push(format!("horn {state:?}")))
            .unwrap();
        let s = seen.clone();
        inputs
            .bind_joystick("steer", move |stick| {
                s.lock().unwrap().push(format!("steer {} {}", stick.x, stick.y));
            })
            .unwrap();
        let s = seen.clone();
        inputs
            .bind_trigger("throttle", move |value| {
                s.lock().unwrap().push(format!("throttle {value}"));
            })
            .unwrap();
        inputs.attach(&bus);

        bus.publish(KeyboardInput {
            name: "horn".to_string(),
            pressed: true,
        })
        .await
        .unwrap();
        bus.publish(GamepadJoystickInput {
            name: "steer".to_string(),
            pressed: false,
            x: 0.5,
            y: -0.25,
        })
        .await
        .unwrap();
        bus.publish(GamepadTriggerInput {
            name: "throttle".to_string(),
            value: 0.75,
        })
        .await
        .unwrap();
        bus.publish(KeyboardInput {
            name: "horn".to_string(),
            pressed: false,
        })
        .await
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "horn Pressed",
                "steer 0.5 -0.25",
                "throttle 0.75",
                "horn Released"
            ]
        );
    }

    #[tokio::test]
    async fn test_unbound_events_are_ignored() {
        let bus = TopicBus::new();
        let inputs = Arc::new(InputService::new(config()));
        inputs.attach(&bus);

        // Configured but unbound, and not configured at all.
        bus.publish(KeyboardInput {
            name: "lights".to_string(),
            pressed: true,
        })
        .await
        .unwrap();
        bus.publish(GamepadButtonInput {
            name: "select".to_string(),
            state: InputState::Pressed,
        })
        .await
        .unwrap();
        assert_eq!(bus.stats().failed, 0);
    }

    #[test]
    fn test_catalog_lists_configured_inputs() {
        let inputs = InputService::new(config());
        let catalog = inputs.catalog();
        assert_eq!(catalog.keyboard["lights"], "KeyL");
        assert_eq!(catalog.gamepad["throttle"], 7);
    }
}
