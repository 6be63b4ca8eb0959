//! Command dispatch: bridges CLI args -> core Controller -> output formatting.

pub mod config_cmd;
pub mod containers;
pub mod refresh;
pub mod stacks;
pub mod status;
pub mod watch;

use stackwatch_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Stacks(args) => stacks::handle(controller, args, global).await,
        Command::Status => status::handle(controller, global).await,
        Command::Refresh(args) => refresh::handle(controller, &args, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        Command::Containers { path } => containers::handle(controller, &path, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
