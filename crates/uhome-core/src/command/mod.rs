// ── Command API ──
//
// Typed device commands. Each one declares the capabilities it needs and
// lowers to one or more vendor commands.

mod dispatcher;

use serde_json::{Value, json};

use uhome_api::DeviceCommand;

use crate::error::CoreError;
use crate::model::Capability;

pub use dispatcher::CommandDispatcher;

/// Options for [`Command::TurnOn`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOn {
    /// Percent, 0-100.
    pub brightness: Option<u8>,
    pub rgb_color: Option<[u8; 3]>,
    /// Kelvin.
    pub color_temp: Option<u32>,
}

/// A write operation against one device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Lock,
    Unlock,
    TurnOn(TurnOn),
    TurnOff,
    /// Any vendor capability/command pair, passed through unchanged.
    Raw {
        capability: String,
        name: String,
        arguments: Option<Value>,
    },
}

impl Command {
    /// Check arguments without looking at any device.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::TurnOn(opts) => {
                if let Some(brightness) = opts.brightness.filter(|b| *b > 100) {
                    return Err(CoreError::Validation {
                        message: format!("brightness must be 0-100, got {brightness}"),
                    });
                }
                if opts.color_temp == Some(0) {
                    return Err(CoreError::Validation {
                        message: "color temperature must be positive".into(),
                    });
                }
                if opts.rgb_color.is_some() && opts.color_temp.is_some() {
                    return Err(CoreError::Validation {
                        message: "rgb color and color temperature are mutually exclusive".into(),
                    });
                }
                Ok(())
            }
            Self::Raw { capability, name, .. } => {
                if capability.trim().is_empty() || name.trim().is_empty() {
                    return Err(CoreError::Validation {
                        message: "capability and command name are required".into(),
                    });
                }
                Ok(())
            }
            Self::Lock | Self::Unlock | Self::TurnOff => Ok(()),
        }
    }

    /// Every capability the device must declare. `Err` carries a vendor
    /// capability tag this crate does not know.
    pub fn required_capabilities(&self) -> Result<Vec<Capability>, String> {
        match self {
            Self::Lock | Self::Unlock => Ok(vec![Capability::Lock]),
            Self::TurnOff => Ok(vec![Capability::Switch]),
            Self::TurnOn(opts) => {
                let mut required = vec![Capability::Switch];
                if opts.brightness.is_some() {
                    required.push(Capability::Brightness);
                }
                if opts.rgb_color.is_some() {
                    required.push(Capability::Color);
                }
                if opts.color_temp.is_some() {
                    required.push(Capability::ColorTemperature);
                }
                Ok(required)
            }
            Self::Raw { capability, .. } => capability
                .parse::<Capability>()
                .map(|c| vec![c])
                .map_err(|_| capability.clone()),
        }
    }

    /// The vendor commands to send, in order.
    pub fn lower(&self) -> Vec<DeviceCommand> {
        let lock = Capability::Lock.vendor_name();
        let switch = Capability::Switch.vendor_name();
        match self {
            Self::Lock => vec![DeviceCommand::new(lock, "lock")],
            Self::Unlock => vec![DeviceCommand::new(lock, "unlock")],
            Self::TurnOff => vec![DeviceCommand::new(switch, "off")],
            Self::TurnOn(opts) => {
                let mut commands = vec![DeviceCommand::new(switch, "on")];
                if let Some(level) = opts.brightness {
                    commands.push(
                        DeviceCommand::new(Capability::Brightness.vendor_name(), "setLevel")
                            .with_arguments(json!({ "level": level })),
                    );
                }
                if let Some([r, g, b]) = opts.rgb_color {
                    commands.push(
                        DeviceCommand::new(Capability::Color.vendor_name(), "setColor")
                            .with_arguments(json!({ "color": { "r": r, "g": g, "b": b } })),
                    );
                }
                if let Some(kelvin) = opts.color_temp {
                    commands.push(
                        DeviceCommand::new(
                            Capability::ColorTemperature.vendor_name(),
                            "setColorTemperature",
                        )
                        .with_arguments(json!({ "value": kelvin })),
                    );
                }
                commands
            }
            Self::Raw {
                capability,
                name,
                arguments,
            } => {
                let mut command = DeviceCommand::new(capability.clone(), name.clone());
                command.arguments.clone_from(arguments);
                vec![command]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn turn_on_with_options_lowers_in_order() {
        let command = Command::TurnOn(TurnOn {
            brightness: Some(40),
            rgb_color: Some([255, 0, 10]),
            color_temp: None,
        });
        let lowered = command.lower();
        let names: Vec<&str> = lowered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["on", "setLevel", "setColor"]);
        assert_eq!(lowered[1].arguments, Some(json!({"level": 40})));
        assert_eq!(
            lowered[2].arguments,
            Some(json!({"color": {"r": 255, "g": 0, "b": 10}}))
        );
        assert_eq!(
            command.required_capabilities(),
            Ok(vec![Capability::Switch, Capability::Brightness, Capability::Color])
        );
    }

    #[test]
    fn brightness_above_100_is_invalid() {
        let command = Command::TurnOn(TurnOn {
            brightness: Some(101),
            ..TurnOn::default()
        });
        assert!(matches!(command.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn color_and_temperature_are_exclusive() {
        let command = Command::TurnOn(TurnOn {
            rgb_color: Some([1, 2, 3]),
            color_temp: Some(3000),
            ..TurnOn::default()
        });
        assert!(command.validate().is_err());
    }

    #[test]
    fn raw_command_with_unknown_capability_reports_tag() {
        let command = Command::Raw {
            capability: "st.thermostat".into(),
            name: "setHeat".into(),
            arguments: None,
        };
        assert_eq!(command.required_capabilities(), Err("st.thermostat".to_string()));
    }

    #[test]
    fn lock_lowers_to_vendor_command() {
        assert_eq!(
            Command::Unlock.lower(),
            vec![DeviceCommand::new("st.lock", "unlock")]
        );
    }
}
