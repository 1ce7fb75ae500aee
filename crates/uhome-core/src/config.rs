// ── Runtime coordinator configuration ──
//
// Describes how the coordinator polls and which push updates it accepts.
// Never touches disk: the host (CLI, config crate) builds it and hands it in.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::model::DeviceId;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FIRST_REFRESH_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_QUERY_CONCURRENCY: usize = 4;

/// Configuration for a single coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Interval between background polls. Zero disables the poll task.
    pub poll_interval: Duration,
    /// Upper bound for [`Coordinator::first_refresh_with_timeout`](crate::Coordinator::first_refresh_with_timeout).
    pub first_refresh_timeout: Duration,
    /// Whether push updates are accepted and the push URL may be registered.
    pub push_enabled: bool,
    /// Push allow-list. Empty accepts pushes for every known device.
    pub push_devices: BTreeSet<DeviceId>,
    /// Maximum number of per-device state queries in flight during a poll.
    pub query_concurrency: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            first_refresh_timeout: DEFAULT_FIRST_REFRESH_TIMEOUT,
            push_enabled: true,
            push_devices: BTreeSet::new(),
            query_concurrency: DEFAULT_QUERY_CONCURRENCY,
        }
    }
}

impl CoordinatorConfig {
    /// `true` if a push for `device_id` passes the allow-list.
    pub fn accepts_push_for(&self, device_id: &DeviceId) -> bool {
        self.push_devices.is_empty() || self.push_devices.contains(device_id)
    }
}
