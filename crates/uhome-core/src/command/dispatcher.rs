// ── Command dispatch ──
//
// Validates a command against the target device's declared capabilities,
// forwards it to the vendor, then re-queries the device. Local state is
// never changed before the vendor confirms.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::CoreError;

use super::{Command, TurnOn};

/// Command surface exposed to adapters. Obtain one from
/// [`Coordinator::dispatcher`].
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    coordinator: Coordinator,
}

impl CommandDispatcher {
    pub(crate) fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// Validate and send `command` to `device_id`.
    ///
    /// Fails with [`CoreError::UnsupportedFeature`] before any network call
    /// if the device lacks a required capability. Vendor and transport
    /// errors propagate unchanged. On success, or when a multi-step command
    /// fails after its first step, the device is re-queried; a failing
    /// re-query is logged, not returned.
    pub async fn execute(&self, device_id: &str, command: &Command) -> Result<(), CoreError> {
        command.validate()?;

        let device =
            self.coordinator
                .device(device_id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    device_id: device_id.to_owned(),
                })?;

        let required =
            command
                .required_capabilities()
                .map_err(|capability| CoreError::UnsupportedFeature {
                    device_id: device_id.to_owned(),
                    capability,
                })?;
        if let Some(missing) = required.into_iter().find(|c| !device.supports(*c)) {
            debug!(device_id, capability = %missing, "command rejected: capability missing");
            return Err(CoreError::UnsupportedFeature {
                device_id: device_id.to_owned(),
                capability: missing.to_string(),
            });
        }

        let client = self.coordinator.client();
        let steps = command.lower();
        for (sent, wire) in steps.iter().enumerate() {
            if let Err(e) = client.send_command(device_id, wire).await {
                // Earlier steps were accepted; pick up their effect.
                if sent > 0 {
                    warn!(device_id, sent, error = %e, "compound command failed part-way");
                    self.refresh_after_command(device_id).await;
                }
                return Err(e.into());
            }
        }
        info!(device_id, ?command, "command sent");

        self.refresh_after_command(device_id).await;
        Ok(())
    }

    async fn refresh_after_command(&self, device_id: &str) {
        if let Err(e) = self.coordinator.refresh_device(device_id).await {
            warn!(device_id, error = %e, "refresh after command failed");
        }
    }

    /// Generic vendor command.
    pub async fn send(
        &self,
        device_id: &str,
        capability: &str,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<(), CoreError> {
        self.execute(
            device_id,
            &Command::Raw {
                capability: capability.to_owned(),
                name: name.to_owned(),
                arguments,
            },
        )
        .await
    }

    pub async fn lock(&self, device_id: &str) -> Result<(), CoreError> {
        self.execute(device_id, &Command::Lock).await
    }

    pub async fn unlock(&self, device_id: &str) -> Result<(), CoreError> {
        self.execute(device_id, &Command::Unlock).await
    }

    pub async fn turn_on(&self, device_id: &str, options: TurnOn) -> Result<(), CoreError> {
        self.execute(device_id, &Command::TurnOn(options)).await
    }

    pub async fn turn_off(&self, device_id: &str) -> Result<(), CoreError> {
        self.execute(device_id, &Command::TurnOff).await
    }
}
