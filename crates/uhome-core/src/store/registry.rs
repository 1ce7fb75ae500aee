// ── Device registry ──
//
// Concurrent in-memory map from device id to device. Each device lives in
// its own `watch` channel so writes to one device serialize on that
// channel's lock and subscribers are woken only on real change. A second
// `watch` carries the sorted all-devices snapshot.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::convert::DeviceRecord;
use crate::model::{Device, DeviceId, StateAttributes, lookup_handle_type};
use crate::stream::{DeviceStream, DevicesStream, EntityStream};

/// Result of [`DeviceRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The device was new and has been added.
    Created,
    /// The device was known; `changed` reports whether metadata moved.
    Updated { changed: bool },
    /// The handle type is not supported; nothing was stored.
    Skipped,
}

/// Device id to device mapping.
///
/// Readers get cheap `Arc<Device>` snapshots. Mutation is crate-private:
/// only the coordinator writes.
pub struct DeviceRegistry {
    devices: DashMap<DeviceId, watch::Sender<Arc<Device>>>,
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            devices: DashMap::new(),
            snapshot,
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.get(id).map(|tx| Arc::clone(&tx.borrow()))
    }

    /// All devices, sorted by id.
    pub fn all(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.all().iter().map(|d| d.id().clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Per-device change feed. `None` if the device is unknown.
    pub fn subscribe(&self, id: &str) -> Option<DeviceStream> {
        self.devices
            .get(id)
            .map(|tx| EntityStream::new(tx.subscribe()))
    }

    /// All-devices snapshot feed.
    pub fn subscribe_all(&self) -> DevicesStream {
        EntityStream::new(self.snapshot.subscribe())
    }

    // ── Mutation (coordinator only) ──────────────────────────────

    /// Create a device on first sight, else refresh its descriptive fields.
    ///
    /// Identity, handle type and capabilities are never changed for a known
    /// device. Unsupported handle types are skipped with a warning.
    pub(crate) fn upsert(&self, record: DeviceRecord) -> UpsertOutcome {
        let outcome = match self.devices.entry(record.id.clone()) {
            Entry::Occupied(entry) => {
                let changed = entry.get().send_if_modified(|device| {
                    let current: &Device = device;
                    let differs = current.name != record.name
                        || current.manufacturer != record.manufacturer
                        || current.model != record.model
                        || current.hw_version != record.hw_version;
                    if differs {
                        let device = Arc::make_mut(device);
                        device.name.clone_from(&record.name);
                        device.manufacturer.clone_from(&record.manufacturer);
                        device.model.clone_from(&record.model);
                        device.hw_version.clone_from(&record.hw_version);
                    }
                    differs
                });
                UpsertOutcome::Updated { changed }
            }
            Entry::Vacant(entry) => {
                let Some(profile) = lookup_handle_type(&record.handle_type) else {
                    warn!(
                        device_id = %record.id,
                        handle_type = %record.handle_type,
                        "skipping device with unsupported handle type"
                    );
                    return UpsertOutcome::Skipped;
                };
                info!(
                    device_id = %record.id,
                    kind = %profile.kind,
                    handle_type = %record.handle_type,
                    "adding device"
                );
                let device = Device {
                    id: record.id,
                    handle_type: record.handle_type,
                    kind: profile.kind,
                    name: record.name,
                    manufacturer: record.manufacturer,
                    model: record.model,
                    hw_version: record.hw_version,
                    capabilities: profile.capabilities,
                    state: StateAttributes::new(),
                    available: false,
                    updated_at: None,
                };
                let (tx, _) = watch::channel(Arc::new(device));
                entry.insert(tx);
                UpsertOutcome::Created
            }
        };

        if matches!(
            outcome,
            UpsertOutcome::Created | UpsertOutcome::Updated { changed: true }
        ) {
            self.rebuild_snapshot();
        }
        outcome
    }

    /// Merge `update` into a device's state and mark it available.
    ///
    /// Only keys present in `update` (and backed by a declared capability)
    /// are written. Returns `None` for unknown devices, otherwise whether
    /// anything changed. Applying the same update twice is a no-op the
    /// second time.
    pub(crate) fn apply_state(&self, id: &str, update: &StateAttributes) -> Option<bool> {
        self.merge_state(id, update, true)
    }

    /// Apply a push update. Same merge semantics as a query result, except
    /// that an entry with no supported attributes leaves the device alone.
    pub(crate) fn apply_push(&self, id: &str, update: &StateAttributes) -> Option<bool> {
        self.merge_state(id, update, false)
    }

    fn merge_state(
        &self,
        id: &str,
        update: &StateAttributes,
        empty_marks_available: bool,
    ) -> Option<bool> {
        let changed = {
            let Some(tx) = self.devices.get(id) else {
                debug!(device_id = id, "state for unknown device ignored");
                return None;
            };
            tx.send_if_modified(|device| {
                let mut supported = update.clone();
                supported.retain_supported(&device.capabilities);
                if supported.is_empty() && !empty_marks_available {
                    return false;
                }

                let mut next_state = device.state.clone();
                let state_changed = next_state.merge(&supported);
                if !state_changed && device.available {
                    return false;
                }

                let device = Arc::make_mut(device);
                device.state = next_state;
                device.available = true;
                if state_changed {
                    device.updated_at = Some(Utc::now());
                }
                true
            })
        };

        if changed {
            self.rebuild_snapshot();
        }
        Some(changed)
    }

    /// Set a device's availability. Returns `true` if it changed.
    pub(crate) fn set_available(&self, id: &str, available: bool) -> bool {
        let changed = {
            let Some(tx) = self.devices.get(id) else {
                return false;
            };
            tx.send_if_modified(|device| {
                if device.available == available {
                    return false;
                }
                Arc::make_mut(device).available = available;
                true
            })
        };

        if changed {
            self.rebuild_snapshot();
        }
        changed
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Rebuild the sorted snapshot from live device values.
    ///
    /// Runs under the snapshot lock so concurrent rebuilds cannot publish
    /// out of order.
    fn rebuild_snapshot(&self) {
        self.snapshot.send_modify(|snapshot| {
            let mut devices: Vec<Arc<Device>> = self
                .devices
                .iter()
                .map(|entry| Arc::clone(&entry.value().borrow()))
                .collect();
            devices.sort_by(|a, b| a.id.cmp(&b.id));
            *snapshot = Arc::new(devices);
        });
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.devices.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::{Attribute, Capability};

    fn record(id: &str, handle_type: &str) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId::from(id),
            handle_type: handle_type.into(),
            name: format!("{id} name"),
            manufacturer: "U-tec".into(),
            model: None,
            hw_version: None,
        }
    }

    fn attrs(pairs: &[(Attribute, serde_json::Value)]) -> StateAttributes {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn upsert_creates_then_updates() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.upsert(record("a", "utec-lock")), UpsertOutcome::Created);
        assert_eq!(
            registry.upsert(record("a", "utec-lock")),
            UpsertOutcome::Updated { changed: false }
        );
        assert_eq!(registry.len(), 1);
        assert!(!registry.get("a").unwrap().available());
    }

    #[test]
    fn unknown_handle_type_is_skipped() {
        let registry = DeviceRegistry::new();
        assert_eq!(
            registry.upsert(record("cam", "utec-camera")),
            UpsertOutcome::Skipped
        );
        assert!(registry.is_empty());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn capabilities_survive_rediscovery_with_other_handle_type() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("a", "utec-lock"));
        let before = registry.get("a").unwrap().capabilities().clone();

        let mut renamed = record("a", "utec-switch");
        renamed.name = "Back Door".into();
        assert_eq!(
            registry.upsert(renamed),
            UpsertOutcome::Updated { changed: true }
        );

        let device = registry.get("a").unwrap();
        assert_eq!(device.capabilities(), &before);
        assert_eq!(device.handle_type(), "utec-lock");
        assert_eq!(device.name(), "Back Door");
    }

    #[test]
    fn apply_state_merges_only_supported_keys() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("a", "utec-lock"));

        let changed = registry.apply_state(
            "a",
            &attrs(&[
                (Attribute::LockState, json!("locked")),
                (Attribute::Brightness, json!(50)),
            ]),
        );
        assert_eq!(changed, Some(true));

        let device = registry.get("a").unwrap();
        assert_eq!(device.lock_state(), Some("locked"));
        assert!(!device.state().contains(Attribute::Brightness));
        assert!(device.available());
        assert!(device.supports(Capability::Lock));
    }

    #[test]
    fn push_is_idempotent() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("bulb", "utec-bulb-color-rgbw"));
        let update = attrs(&[(Attribute::IsOn, json!(true)), (Attribute::Brightness, json!(30))]);

        assert_eq!(registry.apply_push("bulb", &update), Some(true));
        let once = registry.get("bulb").unwrap();
        assert_eq!(registry.apply_push("bulb", &update), Some(false));
        let twice = registry.get("bulb").unwrap();

        assert_eq!(*once, *twice);
    }

    #[test]
    fn push_for_unknown_device_is_noop() {
        let registry = DeviceRegistry::new();
        assert_eq!(
            registry.apply_push("ghost", &attrs(&[(Attribute::IsOn, json!(true))])),
            None
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn push_without_supported_keys_keeps_device_unavailable() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("a", "utec-lock"));
        registry.set_available("a", false);

        let changed = registry.apply_push("a", &attrs(&[(Attribute::Brightness, json!(40))]));
        assert_eq!(changed, Some(false));
        assert_eq!(registry.apply_push("a", &StateAttributes::new()), Some(false));

        let device = registry.get("a").unwrap();
        assert!(!device.available());
        assert!(device.state().is_empty());
    }

    #[test]
    fn partial_update_keeps_other_keys() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("bulb", "utec-bulb-color-rgbw"));
        registry.apply_state(
            "bulb",
            &attrs(&[(Attribute::IsOn, json!(true)), (Attribute::Brightness, json!(30))]),
        );
        registry.apply_push("bulb", &attrs(&[(Attribute::Brightness, json!(80))]));

        let device = registry.get("bulb").unwrap();
        assert_eq!(device.is_on(), Some(true));
        assert_eq!(device.brightness(), Some(80));
    }

    #[tokio::test]
    async fn device_stream_fires_only_on_change() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("a", "utec-lock"));
        let mut stream = registry.subscribe("a").unwrap();
        let update = attrs(&[(Attribute::LockState, json!("unlocked"))]);

        registry.apply_state("a", &update);
        let device = stream.changed().await.unwrap();
        assert_eq!(device.lock_state(), Some("unlocked"));

        registry.apply_state("a", &update);
        assert!(!stream.has_changed());
    }

    #[test]
    fn availability_toggles() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("a", "utec-switch"));
        assert!(!registry.set_available("a", false));
        assert!(registry.set_available("a", true));
        assert!(registry.get("a").unwrap().available());
        assert!(!registry.set_available("ghost", true));
    }

    #[test]
    fn snapshot_is_sorted_and_tracks_new_devices() {
        let registry = DeviceRegistry::new();
        let all = registry.subscribe_all();
        registry.upsert(record("b", "utec-switch"));
        registry.upsert(record("a", "utec-lock"));

        let ids: Vec<String> = all.latest().iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
