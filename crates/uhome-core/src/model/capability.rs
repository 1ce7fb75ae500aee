// ── Capabilities and state attributes ──
//
// A capability is a vendor feature tag (`st.lock`, `st.switch`, ...).
// Each capability owns exactly one state attribute.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// A named feature a device supports, keyed by its vendor tag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Capability {
    #[serde(rename = "st.lock")]
    #[strum(serialize = "st.lock")]
    Lock,
    #[serde(rename = "st.doorSensor")]
    #[strum(serialize = "st.doorSensor")]
    DoorSensor,
    #[serde(rename = "st.switch")]
    #[strum(serialize = "st.switch")]
    Switch,
    #[serde(rename = "st.switchLevel")]
    #[strum(serialize = "st.switchLevel")]
    Brightness,
    #[serde(rename = "st.color")]
    #[strum(serialize = "st.color")]
    Color,
    #[serde(rename = "st.colorTemperature")]
    #[strum(serialize = "st.colorTemperature")]
    ColorTemperature,
    #[serde(rename = "st.batteryLevel")]
    #[strum(serialize = "st.batteryLevel")]
    BatteryLevel,
}

impl Capability {
    /// The vendor tag, e.g. `"st.lock"`.
    pub fn vendor_name(self) -> &'static str {
        self.into()
    }

    /// The state attribute this capability reports.
    pub fn attribute(self) -> Attribute {
        match self {
            Self::Lock => Attribute::LockState,
            Self::DoorSensor => Attribute::DoorState,
            Self::Switch => Attribute::IsOn,
            Self::Brightness => Attribute::Brightness,
            Self::Color => Attribute::RgbColor,
            Self::ColorTemperature => Attribute::ColorTemp,
            Self::BatteryLevel => Attribute::BatteryLevel,
        }
    }

    /// Vendor state name reported under this capability in query responses.
    pub fn state_name(self) -> &'static str {
        match self {
            Self::Lock => "lockState",
            Self::DoorSensor => "sensorState",
            Self::Switch => "switch",
            Self::Brightness | Self::BatteryLevel => "level",
            Self::Color => "color",
            Self::ColorTemperature => "colorTemperature",
        }
    }
}

/// Normalized state attribute names exposed to consumers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Attribute {
    LockState,
    DoorState,
    IsOn,
    Brightness,
    RgbColor,
    ColorTemp,
    BatteryLevel,
}

impl Attribute {
    pub fn capability(self) -> Capability {
        match self {
            Self::LockState => Capability::Lock,
            Self::DoorState => Capability::DoorSensor,
            Self::IsOn => Capability::Switch,
            Self::Brightness => Capability::Brightness,
            Self::RgbColor => Capability::Color,
            Self::ColorTemp => Capability::ColorTemperature,
            Self::BatteryLevel => Capability::BatteryLevel,
        }
    }

    /// Resolve a vendor `{capability, name}` state pair. Case-insensitive.
    pub fn from_vendor_state(capability: &str, name: &str) -> Option<Self> {
        let capability: Capability = capability.parse().ok()?;
        capability
            .state_name()
            .eq_ignore_ascii_case(name)
            .then_some(capability.attribute())
    }
}

// ── StateAttributes ──────────────────────────────────────────────

/// Mapping from attribute to its last reported value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StateAttributes(BTreeMap<Attribute, Value>);

impl StateAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attribute: Attribute) -> Option<&Value> {
        self.0.get(&attribute)
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.0.contains_key(&attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, &Value)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, attribute: Attribute, value: Value) {
        self.0.insert(attribute, value);
    }

    /// Overwrite only the keys present in `update`. Returns `true` if any
    /// value actually changed.
    pub(crate) fn merge(&mut self, update: &StateAttributes) -> bool {
        let mut changed = false;
        for (attribute, value) in &update.0 {
            if self.0.get(attribute) != Some(value) {
                self.0.insert(*attribute, value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Drop attributes whose capability the device does not declare.
    pub(crate) fn retain_supported(&mut self, capabilities: &BTreeSet<Capability>) {
        self.0
            .retain(|attribute, _| capabilities.contains(&attribute.capability()));
    }
}

impl FromIterator<(Attribute, Value)> for StateAttributes {
    fn from_iter<I: IntoIterator<Item = (Attribute, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_capability_round_trips_through_its_attribute() {
        for capability in Capability::iter() {
            assert_eq!(capability.attribute().capability(), capability);
        }
    }

    #[test]
    fn vendor_state_lookup_is_case_insensitive() {
        assert_eq!(
            Attribute::from_vendor_state("st.lock", "lockState"),
            Some(Attribute::LockState)
        );
        assert_eq!(
            Attribute::from_vendor_state("ST.SWITCHLEVEL", "Level"),
            Some(Attribute::Brightness)
        );
        assert_eq!(Attribute::from_vendor_state("st.lock", "level"), None);
        assert_eq!(Attribute::from_vendor_state("st.unknown", "x"), None);
    }

    #[test]
    fn merge_reports_change_only_when_values_differ() {
        let mut state: StateAttributes = [(Attribute::IsOn, json!(true))].into_iter().collect();
        let same: StateAttributes = [(Attribute::IsOn, json!(true))].into_iter().collect();
        let update: StateAttributes = [(Attribute::Brightness, json!(40))].into_iter().collect();

        assert!(!state.merge(&same));
        assert!(state.merge(&update));
        assert_eq!(state.get(Attribute::IsOn), Some(&json!(true)));
        assert_eq!(state.get(Attribute::Brightness), Some(&json!(40)));
    }

    #[test]
    fn retain_supported_drops_foreign_attributes() {
        let mut state: StateAttributes = [
            (Attribute::LockState, json!("locked")),
            (Attribute::Brightness, json!(10)),
        ]
        .into_iter()
        .collect();
        state.retain_supported(&BTreeSet::from([Capability::Lock]));
        assert_eq!(state.keys().collect::<Vec<_>>(), vec![Attribute::LockState]);
    }

    #[test]
    fn attributes_serialize_with_snake_case_keys() {
        let state: StateAttributes = [(Attribute::ColorTemp, json!(2700))].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&state).unwrap_or_default(),
            json!({"color_temp": 2700})
        );
    }
}
