//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod monitor;
pub mod ports;
pub mod radio;
pub mod status;
pub mod util;

use meshlink_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Everything a backend-bound command needs.
pub struct Context<'a> {
    pub controller: Controller,
    /// Name of the profile the controller was built from.
    pub profile: String,
    pub default_port: Option<String>,
    pub global: &'a GlobalOpts,
}

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context<'_>) -> Result<(), CliError> {
    match cmd {
        Command::Ports => ports::handle(ctx).await,
        Command::Status => status::handle(ctx).await,
        Command::Monitor(args) => monitor::handle(ctx, &args).await,
        Command::Send(args) => radio::send(ctx, args).await,
        Command::SetUser(args) => radio::set_user(ctx, args).await,
        Command::Waypoint(args) => radio::waypoint(ctx, args).await,
        // Config and Completions are handled before a backend is launched
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
