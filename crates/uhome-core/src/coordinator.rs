// ── Coordinator ──
//
// Owns the registry and drives it: first refresh, periodic polling,
// push merging and availability tracking. State machine:
//
//   Uninitialized -> FirstRefreshInProgress -> Ready <-> Degraded
//
// A failed or cancelled first refresh falls back to Uninitialized.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use uhome_api::UhomeClient;

use crate::command::CommandDispatcher;
use crate::config::CoordinatorConfig;
use crate::convert::{self, DeviceRecord};
use crate::error::CoreError;
use crate::model::{Device, DeviceId};
use crate::push::PushEnvelope;
use crate::store::{DeviceRegistry, UpsertOutcome};
use crate::stream::{DeviceStream, DevicesStream, EntityStream};

// ── CoordinatorState ─────────────────────────────────────────────

/// Why the coordinator is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    /// Credentials were rejected. Polling stops until re-authorization.
    NeedsReauth,
    /// The last poll failed with a network or API error. Data is stale.
    Unreachable,
}

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    FirstRefreshInProgress,
    Ready,
    Degraded(DegradedReason),
}

impl CoordinatorState {
    /// `true` once the first refresh has completed.
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Ready | Self::Degraded(_))
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::FirstRefreshInProgress => f.write_str("first refresh in progress"),
            Self::Ready => f.write_str("ready"),
            Self::Degraded(DegradedReason::NeedsReauth) => {
                f.write_str("degraded (re-authorization required)")
            }
            Self::Degraded(DegradedReason::Unreachable) => f.write_str("degraded (unreachable)"),
        }
    }
}

/// Result of a [`Coordinator::poll`] call that did not need to surface an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cycle ran and succeeded.
    Completed,
    /// Another poll was already in flight; nothing was done.
    Skipped,
    /// The cycle failed with a network or API error. The coordinator is
    /// degraded and prior data is kept.
    Unreachable,
}

/// What [`Coordinator::update_push_data`] did with an envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// `false` if the envelope was malformed (or push is disabled) and was
    /// dropped as a whole.
    pub accepted: bool,
    /// Entries that changed a device.
    pub applied: usize,
    /// Entries for known devices that changed nothing.
    pub unchanged: usize,
    /// Entries skipped: no id, outside the allow-list, or unknown device.
    pub ignored: usize,
}

// ── Coordinator ──────────────────────────────────────────────────

/// The reconciliation core.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. The coordinator is the
/// only writer to its [`DeviceRegistry`]; consumers read through the
/// accessors or subscribe to change feeds.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    client: UhomeClient,
    registry: DeviceRegistry,
    state: watch::Sender<CoordinatorState>,
    available: watch::Sender<bool>,
    last_successful_poll: watch::Sender<Option<DateTime<Utc>>>,
    poll_gate: Mutex<()>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator. Does NOT contact the vendor; call
    /// [`first_refresh()`](Self::first_refresh) next.
    pub fn new(client: UhomeClient, config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Uninitialized);
        let (available, _) = watch::channel(false);
        let (last_successful_poll, _) = watch::channel(None);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client,
                registry: DeviceRegistry::new(),
                state,
                available,
                last_successful_poll,
                poll_gate: Mutex::new(()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &UhomeClient {
        &self.inner.client
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    /// Command surface bound to this coordinator.
    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(self.clone())
    }

    // ── First refresh ────────────────────────────────────────────

    /// Discover devices and fetch their initial state.
    ///
    /// Fails (and leaves the coordinator Uninitialized) if discovery fails,
    /// returns nothing, or returns only unsupported devices. Per-device
    /// query failures only mark that device unavailable. Credential
    /// rejection surfaces as [`CoreError::AuthenticationFailed`].
    pub async fn first_refresh(&self) -> Result<(), CoreError> {
        let started = self.inner.state.send_if_modified(|state| {
            if *state == CoordinatorState::Uninitialized {
                *state = CoordinatorState::FirstRefreshInProgress;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(CoreError::SetupFailed {
                message: format!("first refresh not allowed in state: {}", self.state()),
                retryable: false,
            });
        }

        // Reverts to Uninitialized on error or if this future is dropped.
        let guard = FirstRefreshGuard {
            state: &self.inner.state,
            armed: true,
        };

        let _gate = self.inner.poll_gate.lock().await;
        info!("starting first refresh");
        self.initial_sync().await?;

        guard.disarm();
        self.mark_cycle_success();
        info!(devices = self.inner.registry.len(), "first refresh complete");
        Ok(())
    }

    /// [`first_refresh()`](Self::first_refresh) bounded by
    /// `config.first_refresh_timeout`. Elapsed waits become a retryable
    /// [`CoreError::SetupFailed`].
    pub async fn first_refresh_with_timeout(&self) -> Result<(), CoreError> {
        let timeout = self.inner.config.first_refresh_timeout;
        if let Ok(result) = tokio::time::timeout(timeout, self.first_refresh()).await {
            result
        } else {
            let elapsed = CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            };
            warn!(error = %elapsed, "first refresh timed out");
            Err(CoreError::SetupFailed {
                message: elapsed.to_string(),
                retryable: true,
            })
        }
    }

    async fn initial_sync(&self) -> Result<(), CoreError> {
        let discovered = self
            .inner
            .client
            .discover_devices()
            .await
            .map_err(setup_error)?;

        if discovered.is_empty() {
            return Err(CoreError::SetupFailed {
                message: "discovery returned no devices".into(),
                retryable: false,
            });
        }

        let mut registered = Vec::new();
        for record in discovered.iter().filter_map(DeviceRecord::from_discovered) {
            let id = record.id.clone();
            if self.inner.registry.upsert(record) != UpsertOutcome::Skipped {
                registered.push(id);
            }
        }

        if registered.is_empty() {
            return Err(CoreError::SetupFailed {
                message: format!(
                    "none of the {} discovered devices is supported",
                    discovered.len()
                ),
                retryable: false,
            });
        }

        self.query_devices(&registered).await
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Run one poll cycle: rediscover, query new devices, then query all
    /// known ones.
    ///
    /// Only one poll runs at a time; a concurrent call returns
    /// [`PollOutcome::Skipped`]. Network and API failures degrade the
    /// coordinator and return [`PollOutcome::Unreachable`]. Credential
    /// rejection degrades it and is returned as an error.
    pub async fn poll(&self) -> Result<PollOutcome, CoreError> {
        let state = self.state();
        if !state.is_initialized() {
            return Err(CoreError::NotReady { state });
        }

        let Ok(_gate) = self.inner.poll_gate.try_lock() else {
            debug!("poll already in flight; skipping");
            return Ok(PollOutcome::Skipped);
        };

        match self.poll_cycle().await {
            Ok(()) => {
                self.mark_cycle_success();
                Ok(PollOutcome::Completed)
            }
            Err(e) if e.is_auth() => {
                error!(error = %e, "authentication failed during poll; re-authorization required");
                self.mark_cycle_failure(DegradedReason::NeedsReauth);
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "poll cycle failed; keeping previous data");
                self.mark_cycle_failure(DegradedReason::Unreachable);
                Ok(PollOutcome::Unreachable)
            }
        }
    }

    async fn poll_cycle(&self) -> Result<(), CoreError> {
        let discovered = self.inner.client.discover_devices().await?;
        debug!(count = discovered.len(), "poll discovery complete");

        let mut new_devices = Vec::new();
        for record in discovered.iter().filter_map(DeviceRecord::from_discovered) {
            let id = record.id.clone();
            if self.inner.registry.upsert(record) == UpsertOutcome::Created {
                new_devices.push(id);
            }
        }

        if !new_devices.is_empty() {
            info!(count = new_devices.len(), "new devices discovered");
            self.query_devices(&new_devices).await?;
        }

        let known: Vec<DeviceId> = self
            .inner
            .registry
            .ids()
            .into_iter()
            .filter(|id| !new_devices.contains(id))
            .collect();
        self.query_devices(&known).await
    }

    /// Query `ids` with bounded concurrency, applying each result as it
    /// arrives. Failures mark the device unavailable; only a credential
    /// rejection is returned.
    async fn query_devices<'a>(&'a self, ids: &'a [DeviceId]) -> Result<(), CoreError> {
        let client = &self.inner.client;
        let concurrency = self.inner.config.query_concurrency.max(1);

        let mut results: QueryStream<'a> = Box::pin(
            stream::iter(ids)
                .map(move |id| async move { (id, client.query_device(id.as_str()).await) })
                .buffer_unordered(concurrency),
        );

        let mut auth_failure = None;
        while let Some((id, result)) = results.next().await {
            match result {
                Ok(Some(status)) => {
                    let update = convert::attributes_from_states(&status.states);
                    self.inner.registry.apply_state(id.as_str(), &update);
                }
                Ok(None) => {
                    warn!(device_id = %id, "query returned no state for device");
                    self.inner.registry.set_available(id.as_str(), false);
                }
                Err(e) if e.is_auth_expired() => {
                    auth_failure.get_or_insert(e);
                }
                Err(e) => {
                    warn!(device_id = %id, error = %e, "failed to fetch device state");
                    self.inner.registry.set_available(id.as_str(), false);
                }
            }
        }

        match auth_failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Re-query a single device (used after commands).
    pub async fn refresh_device(&self, device_id: &str) -> Result<(), CoreError> {
        if !self.inner.registry.contains(device_id) {
            return Err(CoreError::DeviceNotFound {
                device_id: device_id.to_owned(),
            });
        }

        match self.inner.client.query_device(device_id).await {
            Ok(Some(status)) => {
                let update = convert::attributes_from_states(&status.states);
                self.inner.registry.apply_state(device_id, &update);
                Ok(())
            }
            Ok(None) => {
                warn!(device_id, "query returned no state for device");
                self.inner.registry.set_available(device_id, false);
                Ok(())
            }
            Err(e) => {
                if !e.is_auth_expired() {
                    self.inner.registry.set_available(device_id, false);
                }
                Err(e.into())
            }
        }
    }

    // ── Push ─────────────────────────────────────────────────────

    /// Merge a push envelope into the registry.
    ///
    /// Safe to call at any time, including mid-poll. Never fails:
    /// malformed envelopes are logged and dropped, as are entries without
    /// an id, outside the allow-list, or for unknown devices.
    pub fn update_push_data(&self, data: &Value) -> PushReport {
        if !self.inner.config.push_enabled {
            debug!("push disabled; dropping envelope");
            return PushReport::default();
        }

        let envelope = match PushEnvelope::from_value(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed push envelope");
                return PushReport::default();
            }
        };

        let mut report = PushReport {
            accepted: true,
            ..PushReport::default()
        };

        for entry in envelope.entries() {
            let Some(id) = &entry.device_id else {
                warn!("push entry without device id");
                report.ignored += 1;
                continue;
            };

            if !self.inner.config.accepts_push_for(id) {
                debug!(device_id = %id, "push for device outside allow-list skipped");
                report.ignored += 1;
                continue;
            }

            let update = convert::attributes_from_push(&entry.fields);
            match self.inner.registry.apply_push(id.as_str(), &update) {
                Some(true) => {
                    debug!(device_id = %id, "push applied");
                    report.applied += 1;
                }
                Some(false) => report.unchanged += 1,
                None => {
                    debug!(device_id = %id, "push for unknown device ignored");
                    report.ignored += 1;
                }
            }
        }

        report
    }

    /// Register the webhook URL with the vendor. Requires push enabled.
    pub async fn register_push_url(
        &self,
        url: &str,
        access_token: &SecretString,
    ) -> Result<(), CoreError> {
        if !self.inner.config.push_enabled {
            return Err(CoreError::Config {
                message: "push updates are disabled".into(),
            });
        }
        self.inner
            .client
            .set_notification_url(url, access_token)
            .await?;
        Ok(())
    }

    // ── Background lifecycle ─────────────────────────────────────

    /// Spawn the background poll task. Requires a completed first refresh.
    pub async fn start(&self) -> Result<(), CoreError> {
        let state = self.state();
        if !state.is_initialized() {
            return Err(CoreError::NotReady { state });
        }

        let interval = self.inner.config.poll_interval;
        if interval.is_zero() {
            debug!("poll interval is zero; background polling disabled");
            return Ok(());
        }

        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return Ok(());
        }
        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(poll_task(coordinator, interval, cancel)));
        info!(interval_secs = interval.as_secs(), "background polling started");
        Ok(())
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> EntityStream<CoordinatorState> {
        EntityStream::new(self.inner.state.subscribe())
    }

    /// Coordinator-level availability: `true` iff the most recent poll
    /// cycle (or the first refresh) succeeded.
    pub fn is_available(&self) -> bool {
        *self.inner.available.borrow()
    }

    /// Availability as an adapter should present it: coordinator available
    /// and the device's own last fetch succeeded.
    pub fn device_available(&self, device_id: &str) -> bool {
        self.is_available()
            && self
                .inner
                .registry
                .get(device_id)
                .is_some_and(|d| d.available())
    }

    pub fn last_successful_poll(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_successful_poll.borrow()
    }

    // ── Registry accessors ───────────────────────────────────────

    pub fn device(&self, device_id: &str) -> Option<Arc<Device>> {
        self.inner.registry.get(device_id)
    }

    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.registry.all()
    }

    pub fn subscribe_device(&self, device_id: &str) -> Option<DeviceStream> {
        self.inner.registry.subscribe(device_id)
    }

    pub fn subscribe_devices(&self) -> DevicesStream {
        self.inner.registry.subscribe_all()
    }

    // ── Private helpers ──────────────────────────────────────────

    fn mark_cycle_success(&self) {
        self.inner
            .state
            .send_if_modified(|state| replace_if_different(state, CoordinatorState::Ready));
        self.inner
            .available
            .send_if_modified(|available| replace_if_different(available, true));
        self.inner.last_successful_poll.send_replace(Some(Utc::now()));
    }

    fn mark_cycle_failure(&self, reason: DegradedReason) {
        self.inner.state.send_if_modified(|state| {
            replace_if_different(state, CoordinatorState::Degraded(reason))
        });
        self.inner
            .available
            .send_if_modified(|available| replace_if_different(available, false));
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .field("available", &self.is_available())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

/// Resets the state to Uninitialized unless disarmed.
struct FirstRefreshGuard<'a> {
    state: &'a watch::Sender<CoordinatorState>,
    armed: bool,
}

impl FirstRefreshGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FirstRefreshGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(CoordinatorState::Uninitialized);
        }
    }
}

fn replace_if_different<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Map a discovery failure during first refresh.
fn setup_error(err: uhome_api::Error) -> CoreError {
    if err.is_auth_expired() {
        return err.into();
    }
    let retryable = err.is_transient();
    CoreError::SetupFailed {
        message: format!("device discovery failed: {err}"),
        retryable,
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Poll on a fixed interval until cancelled or credentials are rejected.
type QueryStream<'a> = Pin<
    Box<
        dyn futures_core::Stream<Item = (&'a DeviceId, Result<Option<uhome_api::DeviceStatus>, uhome_api::Error>)>
            + Send
            + 'a,
    >,
>;

async fn poll_task(coordinator: Coordinator, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match coordinator.poll().await {
                    Ok(outcome) => debug!(?outcome, "background poll finished"),
                    Err(e) if e.is_auth() => {
                        error!(error = %e, "background polling stopped; re-authorization required");
                        break;
                    }
                    Err(e) => warn!(error = %e, "background poll failed"),
                }
            }
        }
    }
}
