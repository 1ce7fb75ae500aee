//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;
use uhome_core::Device;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&Arc<Device>> for DeviceRow {
    fn from(d: &Arc<Device>) -> Self {
        Self {
            id: d.id().to_string(),
            name: d.name().to_owned(),
            kind: d.kind().to_string(),
            model: d.model().unwrap_or_default().to_owned(),
            available: util::yes_no(d.available()).into(),
            state: util::state_summary(d),
        }
    }
}

pub(super) fn detail(d: &Arc<Device>) -> String {
    let capabilities: Vec<String> = d.capabilities().iter().map(ToString::to_string).collect();
    let mut lines = vec![
        format!("ID:           {}", d.id()),
        format!("Name:         {}", d.name()),
        format!("Kind:         {}", d.kind()),
        format!("Handle type:  {}", d.handle_type()),
        format!("Manufacturer: {}", d.manufacturer()),
        format!("Model:        {}", d.model().unwrap_or("-")),
        format!("Hardware:     {}", d.hw_version().unwrap_or("-")),
        format!("Capabilities: {}", capabilities.join(", ")),
        format!("Available:    {}", util::yes_no(d.available())),
        format!(
            "Updated:      {}",
            d.updated_at()
                .map_or_else(|| "-".into(), |t| t.to_rfc3339())
        ),
    ];
    for (attribute, value) in d.state().iter() {
        lines.push(format!("  {attribute}: {}", util::display_value(value)));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut session = Session::connect(global, None).await?;

    match args.command {
        DevicesCommand::List => {
            let snap = session.coordinator.devices();
            let out = output::render_list(
                global.output,
                &snap,
                |d| DeviceRow::from(d),
                |d| d.id().to_string(),
            );
            output::print_output(&out, global.quiet);
        }

        DevicesCommand::Get { device } => {
            let found = util::resolve_device(&session.coordinator, &device)?;
            let out = output::render_single(global.output, &found, detail, |d| d.id().to_string());
            output::print_output(&out, global.quiet);
        }
    }

    session.persist_rotated_token();
    Ok(())
}
