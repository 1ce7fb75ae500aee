//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod account;
pub mod auth;
pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

use self::control::Action;

/// Dispatch a command that needs an account profile.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(args, global).await,
        Command::Lock(args) => control::handle(Action::Lock(args), global).await,
        Command::Unlock(args) => control::handle(Action::Unlock(args), global).await,
        Command::On(args) => control::handle(Action::On(args), global).await,
        Command::Off(args) => control::handle(Action::Off(args), global).await,
        Command::Send(args) => control::handle(Action::Send(args), global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::User => account::user(global).await,
        Command::PushUrl(args) => account::push_url(args, global).await,
        Command::Auth(args) => auth::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "completions are generated before dispatch".into(),
        }),
    }
}
