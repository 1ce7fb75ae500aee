//! Lock, switch, and raw command handlers.

use uhome_core::{Command as CoreCommand, TurnOn};

use crate::cli::{DeviceArg, GlobalOpts, OnArgs, SendArgs};
use crate::error::CliError;
use crate::session::Session;

use super::util;

/// A write command as parsed from the CLI.
pub enum Action {
    Lock(DeviceArg),
    Unlock(DeviceArg),
    On(OnArgs),
    Off(DeviceArg),
    Send(SendArgs),
}

impl Action {
    fn target(&self) -> &str {
        match self {
            Self::Lock(a) | Self::Unlock(a) | Self::Off(a) => &a.device,
            Self::On(a) => &a.device,
            Self::Send(a) => &a.device,
        }
    }

    fn into_command(self) -> Result<CoreCommand, CliError> {
        Ok(match self {
            Self::Lock(_) => CoreCommand::Lock,
            Self::Unlock(_) => CoreCommand::Unlock,
            Self::Off(_) => CoreCommand::TurnOff,
            Self::On(a) => CoreCommand::TurnOn(TurnOn {
                brightness: a.brightness,
                rgb_color: a.rgb,
                color_temp: a.color_temp,
            }),
            Self::Send(a) => CoreCommand::Raw {
                capability: a.capability,
                name: a.name,
                arguments: a.args.as_deref().map(serde_json::from_str).transpose()?,
            },
        })
    }
}

pub async fn handle(action: Action, global: &GlobalOpts) -> Result<(), CliError> {
    let target = action.target().to_owned();
    let command = action.into_command()?;
    command.validate()?;

    let mut session = Session::connect(global, None).await?;
    let device = util::resolve_device(&session.coordinator, &target)?;

    let result = session
        .coordinator
        .dispatcher()
        .execute(device.id().as_str(), &command)
        .await;
    session.persist_rotated_token();
    result.map_err(|e| session.map_err(e.into()))?;

    if !global.quiet {
        let updated = session.coordinator.device(device.id().as_str()).unwrap_or(device);
        let summary = util::state_summary(&updated);
        if summary.is_empty() {
            eprintln!("{}: command sent", updated.name());
        } else {
            eprintln!("{}: {summary}", updated.name());
        }
    }
    Ok(())
}
