// Wire models for the action endpoint
//
// Deserialization is lenient: the vendor omits fields freely, so nearly
// everything defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of `payload.devices[]` from a `Uhome.Device/Discovery` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub handle_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub custom_data: Option<Value>,
    #[serde(default)]
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub hw_version: Option<String>,
}

/// One entry of `payload.devices[]` from a `Uhome.Device/Query` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    #[serde(default)]
    pub states: Vec<CapabilityState>,
}

/// A single `{capability, name, value}` state triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityState {
    pub capability: String,
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// A command as sent in `payload.devices[].command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub capability: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl DeviceCommand {
    pub fn new(capability: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            name: name.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

/// Account details from `Uhome.User/Get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// `payload.devices` wrapper shared by discovery and query responses.
#[derive(Debug, Deserialize)]
pub(crate) struct DevicesPayload<T> {
    #[serde(default = "Vec::new")]
    pub devices: Vec<T>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn discovered_device_tolerates_missing_fields() {
        let device: DiscoveredDevice =
            serde_json::from_value(json!({"id": "a"})).unwrap_or_default();
        assert_eq!(device.id, "a");
        assert_eq!(device.handle_type, None);
        assert_eq!(device.device_info, DeviceInfo::default());
    }

    #[test]
    fn discovered_device_reads_camel_case() {
        let device: DiscoveredDevice = serde_json::from_value(json!({
            "id": "lock-1",
            "name": "Front Door",
            "handleType": "utec-lock",
            "deviceInfo": {"manufacturer": "U-tec", "model": "U-Bolt", "hwVersion": "1.2"}
        }))
        .unwrap_or_default();
        assert_eq!(device.handle_type.as_deref(), Some("utec-lock"));
        assert_eq!(device.device_info.hw_version.as_deref(), Some("1.2"));
    }

    #[test]
    fn command_without_arguments_omits_key() {
        let value = serde_json::to_value(DeviceCommand::new("st.lock", "lock")).unwrap_or_default();
        assert_eq!(value, json!({"capability": "st.lock", "name": "lock"}));
    }
}
