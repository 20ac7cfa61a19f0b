//! Core topics shared by the gateway and vehicle drivers.

use serde::{Deserialize, Serialize};
use switchyard_core::{RegistryError, Topic, TopicRegistry};

/// A user's intent to move the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DriveInput {
    pub throttle: i32,
    pub steering: i32,
    #[serde(default)]
    pub brake: bool,
}

impl Topic for DriveInput {
    const NAME: &'static str = "DriveInput";
}

/// A key press or release from the remote operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardInput {
    pub name: String,
    pub pressed: bool,
}

impl Topic for KeyboardInput {
    const NAME: &'static str = "KeyboardInput";
}

/// Keyboard message as sent by the control service.
#[derive(Debug, Deserialize)]
pub struct KeyboardMessage {
    pub name: String,
    #[serde(rename = "isPressed")]
    pub is_pressed: bool,
}

impl From<KeyboardMessage> for KeyboardInput {
    fn from(message: KeyboardMessage) -> Self {
        Self {
            name: message.name,
            pressed: message.is_pressed,
        }
    }
}

/// Whether a button or key is held down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputState {
    Pressed,
    Released,
}

impl From<bool> for InputState {
    fn from(pressed: bool) -> Self {
        if pressed {
            Self::Pressed
        } else {
            Self::Released
        }
    }
}

/// A gamepad button changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadButtonInput {
    pub name: String,
    pub state: InputState,
}

impl Topic for GamepadButtonInput {
    const NAME: &'static str = "GamepadButtonInput";
}

/// Gamepad button message as sent by the control service.
#[derive(Debug, Deserialize)]
pub struct GamepadButtonMessage {
    pub name: String,
    #[serde(rename = "isPressed")]
    pub is_pressed: bool,
}

impl From<GamepadButtonMessage> for GamepadButtonInput {
    fn from(message: GamepadButtonMessage) -> Self {
        Self {
            name: message.name,
            state: message.is_pressed.into(),
        }
    }
}

/// A gamepad stick moved. Axes run from -1.0 to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadJoystickInput {
    pub name: String,
    pub pressed: bool,
    pub x: f32,
    pub y: f32,
}

impl Topic for GamepadJoystickInput {
    const NAME: &'static str = "GamepadJoystickInput";
}

/// Gamepad stick message as sent by the control service.
#[derive(Debug, Deserialize)]
pub struct GamepadJoystickMessage {
    pub name: String,
    #[serde(rename = "isPressed", default)]
    pub is_pressed: bool,
    pub x: f32,
    pub y: f32,
}

impl From<GamepadJoystickMessage> for GamepadJoystickInput {
    fn from(message: GamepadJoystickMessage) -> Self {
        Self {
            name: message.name,
            pressed: message.is_pressed,
            x: message.x,
            y: message.y,
        }
    }
}

/// A gamepad trigger moved. The value runs from 0.0 to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamepadTriggerInput {
    pub name: String,
    pub value: f32,
}

impl Topic for GamepadTriggerInput {
    const NAME: &'static str = "GamepadTriggerInput";
}

/// High-level movement request: heading and speed rather than raw
/// throttle and steering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocomotionInput {
    pub direction: f32,
    pub speed: f32,
}

impl Topic for LocomotionInput {
    const NAME: &'static str = "LocomotionInput";
}

/// Current vehicle position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Topic for PositionUpdate {
    const NAME: &'static str = "PositionUpdate";
}

/// Register the core topics.
///
/// # Errors
///
/// Returns an error if another type already claimed one of the names.
pub fn register(registry: &mut TopicRegistry) -> Result<(), RegistryError> {
    registry.register::<DriveInput>()?;
    registry.register::<KeyboardInput>()?;
    registry.register::<GamepadButtonInput>()?;
    registry.register::<GamepadJoystickInput>()?;
    registry.register::<GamepadTriggerInput>()?;
    registry.register::<LocomotionInput>()?;
    registry.register::<PositionUpdate>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_core_topics() {
        let mut registry = TopicRegistry::new();
        register(&mut registry).unwrap();
        assert!(registry.contains("DriveInput"));
        assert!(registry.contains("KeyboardInput"));
        assert!(registry.contains("PositionUpdate"));
        assert!(registry.contains("GamepadJoystickInput"));
        assert!(registry.contains("LocomotionInput"));
        assert_eq!(registry.len(), 7);
        assert!(register(&mut registry).is_ok());
    }

    #[test]
    fn test_drive_input_brake_defaults_off() {
        let drive: DriveInput = serde_json::from_str(r#"{"throttle":3,"steering":-1}"#).unwrap();
        assert!(!drive.brake);
    }

    #[test]
    fn test_keyboard_message_conversion() {
        let message: KeyboardMessage =
            serde_json::from_str(r#"{"name":"horn","isPressed":true}"#).unwrap();
        assert_eq!(
            KeyboardInput::from(message),
            KeyboardInput {
                name: "horn".to_string(),
                pressed: true
            }
        );
    }

    #[test]
    fn test_gamepad_message_conversion() {
        let button: GamepadButtonMessage =
            serde_json::from_str(r#"{"name":"a","isPressed":false}"#).unwrap();
        assert_eq!(GamepadButtonInput::from(button).state, InputState::Released);

        let stick: GamepadJoystickMessage =
            serde_json::from_str(r#"{"name":"left","x":0.5,"y":-1.0}"#).unwrap();
        let stick = GamepadJoystickInput::from(stick);
        assert!(!stick.pressed);
        assert_eq!((stick.x, stick.y), (0.5, -1.0));
    }
}
