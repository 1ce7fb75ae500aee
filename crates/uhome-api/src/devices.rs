// Device endpoints (`Uhome.Device` namespace)

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::client::UhomeClient;
use crate::envelope::{Namespace, Operation};
use crate::error::Error;
use crate::models::{DeviceCommand, DeviceStatus, DevicesPayload, DiscoveredDevice};

impl UhomeClient {
    /// List every device visible to the authorized account.
    pub async fn discover_devices(&self) -> Result<Vec<DiscoveredDevice>, Error> {
        let payload = self
            .request(Namespace::Device, Operation::Discovery, json!({}))
            .await?;
        let devices: Vec<DiscoveredDevice> = devices_from(payload)?;
        debug!(count = devices.len(), "discovered devices");
        Ok(devices)
    }

    /// Fetch the current state of one device.
    ///
    /// Returns `None` when the response carries no entry for `device_id`.
    pub async fn query_device(&self, device_id: &str) -> Result<Option<DeviceStatus>, Error> {
        let payload = self
            .request(
                Namespace::Device,
                Operation::Query,
                json!({ "devices": [{ "id": device_id }] }),
            )
            .await?;
        let statuses: Vec<DeviceStatus> = devices_from(payload)?;
        Ok(statuses.into_iter().find(|s| s.id == device_id))
    }

    /// Send a command to one device. Returns the raw response payload.
    pub async fn send_command(
        &self,
        device_id: &str,
        command: &DeviceCommand,
    ) -> Result<Value, Error> {
        debug!(
            device_id,
            capability = %command.capability,
            command = %command.name,
            "sending device command"
        );
        self.request(
            Namespace::Device,
            Operation::Command,
            json!({ "devices": [{ "id": device_id, "command": command }] }),
        )
        .await
    }
}

fn devices_from<T: DeserializeOwned>(payload: Value) -> Result<Vec<T>, Error> {
    if payload.is_null() {
        return Ok(Vec::new());
    }
    let body = payload.to_string();
    serde_json::from_value::<DevicesPayload<T>>(payload)
        .map(|p| p.devices)
        .map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
}
