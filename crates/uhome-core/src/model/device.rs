// ── Device domain types ──

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::capability::{Attribute, Capability, StateAttributes};

/// Vendor-assigned device identifier. Opaque and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Coarse device family, derived from the handle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Lock,
    Light,
    Switch,
    Sensor,
}

/// A device known to the registry.
///
/// Identity and capabilities are fixed at creation. Descriptive metadata
/// and state are updated by the coordinator; consumers only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) handle_type: String,
    pub(crate) kind: DeviceKind,
    pub(crate) name: String,
    pub(crate) manufacturer: String,
    pub(crate) model: Option<String>,
    pub(crate) hw_version: Option<String>,
    pub(crate) capabilities: BTreeSet<Capability>,
    pub(crate) state: StateAttributes,
    pub(crate) available: bool,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Device {
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn handle_type(&self) -> &str {
        &self.handle_type
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn hw_version(&self) -> Option<&str> {
        self.hw_version.as_deref()
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn state(&self) -> &StateAttributes {
        &self.state
    }

    /// `true` iff the last individual fetch or update for this device
    /// succeeded.
    pub fn available(&self) -> bool {
        self.available
    }

    /// When state was last applied from a query or push.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    // ── Typed state accessors ────────────────────────────────────

    pub fn lock_state(&self) -> Option<&str> {
        self.state.get(Attribute::LockState).and_then(Value::as_str)
    }

    pub fn is_locked(&self) -> Option<bool> {
        self.lock_state().map(|s| s == "locked")
    }

    pub fn is_jammed(&self) -> bool {
        self.lock_state() == Some("jammed")
    }

    pub fn door_state(&self) -> Option<&str> {
        self.state.get(Attribute::DoorState).and_then(Value::as_str)
    }

    pub fn is_on(&self) -> Option<bool> {
        self.state.get(Attribute::IsOn).and_then(Value::as_bool)
    }

    /// Brightness in percent (0-100).
    pub fn brightness(&self) -> Option<u8> {
        self.state
            .get(Attribute::Brightness)
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }

    pub fn rgb_color(&self) -> Option<[u8; 3]> {
        let values = self.state.get(Attribute::RgbColor)?.as_array()?;
        let mut rgb = [0u8; 3];
        if values.len() != rgb.len() {
            return None;
        }
        for (slot, value) in rgb.iter_mut().zip(values) {
            *slot = u8::try_from(value.as_u64()?).ok()?;
        }
        Some(rgb)
    }

    /// Colour temperature in Kelvin.
    pub fn color_temp(&self) -> Option<u32> {
        self.state
            .get(Attribute::ColorTemp)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.state
            .get(Attribute::BatteryLevel)
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    pub(crate) fn light(state: StateAttributes) -> Device {
        Device {
            id: DeviceId::from("bulb-1"),
            handle_type: "utec-bulb-color-rgbw".into(),
            kind: DeviceKind::Light,
            name: "Desk Lamp".into(),
            manufacturer: "U-tec".into(),
            model: None,
            hw_version: None,
            capabilities: BTreeSet::from([
                Capability::Switch,
                Capability::Brightness,
                Capability::Color,
            ]),
            state,
            available: true,
            updated_at: None,
        }
    }

    #[test]
    fn typed_accessors_read_normalized_values() {
        let device = light(
            [
                (Attribute::IsOn, json!(true)),
                (Attribute::Brightness, json!(55)),
                (Attribute::RgbColor, json!([255, 128, 0])),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(device.is_on(), Some(true));
        assert_eq!(device.brightness(), Some(55));
        assert_eq!(device.rgb_color(), Some([255, 128, 0]));
        assert_eq!(device.color_temp(), None);
        assert!(device.supports(Capability::Color));
        assert!(!device.supports(Capability::Lock));
    }

    #[test]
    fn malformed_color_is_none() {
        let device = light([(Attribute::RgbColor, json!([300, 0, 0]))].into_iter().collect());
        assert_eq!(device.rgb_color(), None);
    }

    #[test]
    fn device_kind_parses_lowercase() {
        assert_eq!("lock".parse::<DeviceKind>().ok(), Some(DeviceKind::Lock));
        assert_eq!(DeviceKind::Sensor.to_string(), "sensor");
    }
}
