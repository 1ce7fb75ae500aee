//! Shared helpers for command handlers.

use std::sync::Arc;

use uhome_core::{Coordinator, Device};

use crate::error::CliError;

/// Resolve a device by id, then by case-insensitive name.
pub fn resolve_device(coordinator: &Coordinator, identifier: &str) -> Result<Arc<Device>, CliError> {
    if let Some(device) = coordinator.device(identifier) {
        return Ok(device);
    }

    let snapshot = coordinator.devices();
    let mut matches = snapshot
        .iter()
        .filter(|d| d.name().eq_ignore_ascii_case(identifier));
    match (matches.next(), matches.next()) {
        (Some(device), None) => Ok(Arc::clone(device)),
        (Some(_), Some(_)) => Err(CliError::Validation {
            field: "device".into(),
            reason: format!("'{identifier}' matches several devices; use the device id"),
        }),
        (None, _) => Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: identifier.into(),
            list_command: "devices list".into(),
        }),
    }
}

/// One-line state summary (`lock_state=locked is_on=true`).
pub fn state_summary(device: &Device) -> String {
    device
        .state()
        .iter()
        .map(|(attribute, value)| format!("{attribute}={}", display_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a JSON value without quotes around strings.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
