// ── Wire-to-domain conversion ──
//
// Turns `uhome-api` wire models (discovery entries, query states, raw
// push entries) into domain types. Values the vendor sends in several
// shapes are normalized here so the registry only ever sees one.

use serde_json::{Map, Value, json};
use tracing::debug;

use uhome_api::{CapabilityState, DiscoveredDevice};

use crate::model::{Attribute, DeviceId, StateAttributes};

const DEFAULT_MANUFACTURER: &str = "U-tec";

/// Descriptive fields from one discovery entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeviceRecord {
    pub id: DeviceId,
    pub handle_type: String,
    pub name: String,
    pub manufacturer: String,
    pub model: Option<String>,
    pub hw_version: Option<String>,
}

impl DeviceRecord {
    /// `None` for entries without an id.
    pub(crate) fn from_discovered(device: &DiscoveredDevice) -> Option<Self> {
        let id = device.id.trim();
        if id.is_empty() {
            return None;
        }
        let info = &device.device_info;
        Some(Self {
            id: DeviceId::from(id),
            handle_type: device.handle_type.clone().unwrap_or_default(),
            name: device
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.to_owned()),
            manufacturer: info
                .manufacturer
                .clone()
                .unwrap_or_else(|| DEFAULT_MANUFACTURER.into()),
            model: info.model.clone(),
            hw_version: info.hw_version.clone(),
        })
    }
}

/// Convert `{capability, name, value}` triples. Unknown triples are skipped.
pub(crate) fn attributes_from_states(states: &[CapabilityState]) -> StateAttributes {
    states
        .iter()
        .filter_map(|state| {
            let Some(attribute) = Attribute::from_vendor_state(&state.capability, &state.name)
            else {
                debug!(
                    capability = %state.capability,
                    name = %state.name,
                    "ignoring unknown state"
                );
                return None;
            };
            normalize(attribute, &state.value).map(|value| (attribute, value))
        })
        .collect()
}

/// Convert one push entry. Accepts either a `states` array in the vendor
/// vocabulary or flat attribute keys (`{"id": .., "lock_state": ..}`).
pub(crate) fn attributes_from_push(entry: &Map<String, Value>) -> StateAttributes {
    if let Some(states) = entry.get("states").and_then(Value::as_array) {
        let states: Vec<CapabilityState> = states
            .iter()
            .filter_map(|s| serde_json::from_value(s.clone()).ok())
            .collect();
        return attributes_from_states(&states);
    }

    entry
        .iter()
        .filter(|(key, _)| key.as_str() != "id")
        .filter_map(|(key, value)| {
            let attribute: Attribute = key.parse().ok()?;
            normalize(attribute, value).map(|v| (attribute, v))
        })
        .collect()
}

/// Coerce a vendor value into the canonical shape for `attribute`.
/// Returns `None` for values that cannot be interpreted.
pub(crate) fn normalize(attribute: Attribute, value: &Value) -> Option<Value> {
    match attribute {
        Attribute::LockState | Attribute::DoorState => match value {
            Value::String(s) => Some(Value::String(s.trim().to_ascii_lowercase())),
            Value::Number(_) => Some(value.clone()),
            _ => None,
        },
        Attribute::IsOn => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "on" | "true" => Some(Value::Bool(true)),
                "off" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Number(n) => n.as_u64().map(|n| Value::Bool(n != 0)),
            _ => None,
        },
        Attribute::Brightness | Attribute::BatteryLevel => value
            .as_u64()
            .filter(|level| *level <= 100)
            .map(Value::from),
        Attribute::ColorTemp => value.as_u64().filter(|k| *k > 0).map(Value::from),
        Attribute::RgbColor => rgb_from(value).map(|[r, g, b]| json!([r, g, b])),
    }
}

fn rgb_from(value: &Value) -> Option<[u8; 3]> {
    let channel = |v: Option<&Value>| v.and_then(Value::as_u64).and_then(|c| u8::try_from(c).ok());
    match value {
        Value::Object(obj) => Some([
            channel(obj.get("r"))?,
            channel(obj.get("g"))?,
            channel(obj.get("b"))?,
        ]),
        Value::Array(values) if values.len() == 3 => Some([
            channel(values.first())?,
            channel(values.get(1))?,
            channel(values.get(2))?,
        ]),
        _ => None,
    }
}
