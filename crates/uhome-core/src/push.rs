// ── Push envelopes ──
//
// Vendor-initiated device updates delivered through the webhook:
// `{"payload": {"devices": [{"id": "...", ...partial state}]}}`.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::DeviceId;

/// A validated push envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEnvelope {
    entries: Vec<PushEntry>,
}

/// One `payload.devices[]` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEntry {
    /// `None` when the entry has no usable `id`.
    pub device_id: Option<DeviceId>,
    /// The entry's fields (including `id`). Empty for non-object entries.
    pub fields: Map<String, Value>,
}

impl PushEnvelope {
    /// Validate the envelope shape: `payload.devices` must be a non-empty list.
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let devices = value
            .get("payload")
            .ok_or_else(|| invalid("missing `payload`"))?
            .get("devices")
            .ok_or_else(|| invalid("missing `payload.devices`"))?
            .as_array()
            .ok_or_else(|| invalid("`payload.devices` is not a list"))?;

        if devices.is_empty() {
            return Err(invalid("`payload.devices` is empty"));
        }

        let entries = devices
            .iter()
            .map(|entry| match entry.as_object() {
                Some(fields) => PushEntry {
                    device_id: fields
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(DeviceId::from),
                    fields: fields.clone(),
                },
                None => PushEntry {
                    device_id: None,
                    fields: Map::new(),
                },
            })
            .collect();

        Ok(Self { entries })
    }

    /// Parse and validate a raw webhook body.
    pub fn from_slice(body: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| CoreError::Validation {
            message: format!("push body is not JSON: {e}"),
        })?;
        Self::from_value(&value)
    }

    pub fn entries(&self) -> &[PushEntry] {
        &self.entries
    }
}

fn invalid(reason: &str) -> CoreError {
    CoreError::Validation {
        message: format!("malformed push envelope: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn valid_envelope_yields_entries() {
        let envelope = PushEnvelope::from_value(&json!({
            "payload": { "devices": [
                { "id": "lock-1", "lock_state": "locked" },
                { "lock_state": "unlocked" },
                "garbage"
            ]}
        }))
        .unwrap_or_else(|e| panic!("unexpected error: {e}"));

        let ids: Vec<Option<String>> = envelope
            .entries()
            .iter()
            .map(|e| e.device_id.as_ref().map(ToString::to_string))
            .collect();
        assert_eq!(ids, vec![Some("lock-1".to_string()), None, None]);
    }

    #[test]
    fn shape_violations_are_validation_errors() {
        for bad in [
            json!({}),
            json!({ "payload": {} }),
            json!({ "payload": { "devices": {} } }),
            json!({ "payload": { "devices": [] } }),
            json!([1, 2, 3]),
        ] {
            assert!(
                matches!(PushEnvelope::from_value(&bad), Err(CoreError::Validation { .. })),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn non_json_body_is_rejected() {
        assert!(PushEnvelope::from_slice(b"not json").is_err());
    }
}
