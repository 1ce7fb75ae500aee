// ── Handle type lookup ──
//
// Static mapping from the vendor's handle type tag to a device kind and
// capability set. Exact entries first, then a keyword classification for
// handle types the vendor adds later within a known family.

use std::collections::BTreeSet;

use super::capability::Capability;
use super::device::DeviceKind;

/// Kind and capability set implied by a handle type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleTypeProfile {
    pub kind: DeviceKind,
    pub capabilities: BTreeSet<Capability>,
}

const LOCK: &[Capability] = &[Capability::Lock, Capability::BatteryLevel];
const LOCK_WITH_SENSOR: &[Capability] = &[
    Capability::Lock,
    Capability::DoorSensor,
    Capability::BatteryLevel,
];
const DIMMER: &[Capability] = &[Capability::Switch, Capability::Brightness];
const COLOR_BULB: &[Capability] = &[
    Capability::Switch,
    Capability::Brightness,
    Capability::Color,
    Capability::ColorTemperature,
];
const SWITCH: &[Capability] = &[Capability::Switch];
const DOOR_SENSOR: &[Capability] = &[Capability::DoorSensor, Capability::BatteryLevel];

const EXACT: &[(&str, DeviceKind, &[Capability])] = &[
    ("utec-lock", DeviceKind::Lock, LOCK),
    ("utec-lock-sensor", DeviceKind::Lock, LOCK_WITH_SENSOR),
    ("utec-dimmer", DeviceKind::Light, DIMMER),
    ("utec-bulb-color-rgbw", DeviceKind::Light, COLOR_BULB),
    ("utec-switch", DeviceKind::Switch, SWITCH),
    ("utec-door-sensor", DeviceKind::Sensor, DOOR_SENSOR),
];

/// Checked in order; the first keyword contained in the handle type wins.
const KEYWORDS: &[(&str, DeviceKind, &[Capability])] = &[
    ("lock", DeviceKind::Lock, LOCK),
    ("bulb", DeviceKind::Light, COLOR_BULB),
    ("light", DeviceKind::Light, COLOR_BULB),
    ("dimmer", DeviceKind::Light, DIMMER),
    ("switch", DeviceKind::Switch, SWITCH),
    ("plug", DeviceKind::Switch, SWITCH),
    ("sensor", DeviceKind::Sensor, DOOR_SENSOR),
];

/// Resolve a handle type. `None` means the device is not supported.
///
/// Pure: the same input always yields the same profile.
pub fn lookup(handle_type: &str) -> Option<HandleTypeProfile> {
    let normalized = handle_type.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }

    EXACT
        .iter()
        .find(|(name, _, _)| *name == normalized)
        .or_else(|| {
            KEYWORDS
                .iter()
                .find(|(keyword, _, _)| normalized.contains(keyword))
        })
        .map(|(_, kind, capabilities)| HandleTypeProfile {
            kind: *kind,
            capabilities: capabilities.iter().copied().collect(),
        })
}
