//! `uhome watch`: background polling plus a live change feed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use owo_colors::OwoColorize;
use tracing::debug;

use uhome_core::{CoordinatorState, DegradedReason, Device, DeviceId};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn device(&self, device: &Device, changes: &str) {
        let line = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(device, true),
            OutputFormat::Plain => device.id().to_string(),
            OutputFormat::Table => {
                let stamp = Local::now().format("%H:%M:%S");
                let name = if self.color {
                    device.name().bold().to_string()
                } else {
                    device.name().to_owned()
                };
                format!("{stamp} {name} {changes}")
            }
        };
        output::print_output(&line, self.quiet);
    }

    fn state(&self, state: CoordinatorState) {
        if self.quiet {
            return;
        }
        let text = format!("coordinator {state}");
        if !self.color {
            eprintln!("{text}");
        } else if state == CoordinatorState::Ready {
            eprintln!("{}", text.green());
        } else {
            eprintln!("{}", text.yellow());
        }
    }
}

/// Describe what changed between two versions of a device.
fn describe_changes(previous: Option<&Device>, current: &Device) -> Option<String> {
    let Some(previous) = previous else {
        return Some(format!("added [{}]", util::state_summary(current)));
    };

    let mut parts = Vec::new();
    if previous.available() != current.available() {
        parts.push(if current.available() {
            "available".to_owned()
        } else {
            "unavailable".to_owned()
        });
    }
    for (attribute, value) in current.state().iter() {
        if previous.state().get(attribute) != Some(value) {
            parts.push(format!("{attribute}={}", util::display_value(value)));
        }
    }
    if previous.name() != current.name() {
        parts.push(format!("renamed from '{}'", previous.name()));
    }

    (!parts.is_empty()).then(|| parts.join(" "))
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let interval = args.interval.map(Duration::from_secs);
    let mut session = Session::connect(global, interval).await?;
    let coordinator = session.coordinator.clone();
    let profile = session.profile_name.clone();

    let printer = Printer {
        format: global.output,
        color: output::should_color(global.color),
        quiet: global.quiet,
    };

    let mut devices = coordinator.subscribe_devices();
    let mut states = coordinator.subscribe_state();
    let mut known: HashMap<DeviceId, Arc<Device>> = HashMap::new();
    for device in devices.current().iter() {
        if let Some(changes) = describe_changes(None, device) {
            printer.device(device, &changes);
        }
        known.insert(device.id().clone(), Arc::clone(device));
    }

    coordinator
        .start()
        .await
        .map_err(|e| CliError::from(e).with_profile(&profile))?;

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break Ok(());
            }
            snapshot = devices.changed() => {
                let Some(snapshot) = snapshot else { break Ok(()) };
                for device in snapshot.iter() {
                    let previous = known.get(device.id());
                    if previous.is_some_and(|p| Arc::ptr_eq(p, device)) {
                        continue;
                    }
                    if let Some(changes) = describe_changes(previous.map(Arc::as_ref), device) {
                        printer.device(device, &changes);
                    }
                    known.insert(device.id().clone(), Arc::clone(device));
                }
            }
            state = states.changed() => {
                let Some(state) = state else { break Ok(()) };
                printer.state(state);
                if state == CoordinatorState::Degraded(DegradedReason::NeedsReauth) {
                    break Err(CliError::AuthFailed {
                        profile: profile.clone(),
                        message: "credentials rejected during polling".into(),
                    });
                }
            }
            alive = session.persist_next_rotation() => {
                if !alive {
                    break Ok(());
                }
            }
        }
    };

    coordinator.shutdown().await;
    session.persist_rotated_token();
    result
}

