//! Shared helpers for command handlers.

use meshlink_core::{Controller, RequestStatus};

use super::Context;
use crate::cli::PortArg;
use crate::error::CliError;

/// The port named on the command line, else the profile's default.
pub fn resolve_port(arg: &PortArg, ctx: &Context<'_>) -> Result<String, CliError> {
    arg.port
        .clone()
        .or_else(|| ctx.default_port.clone())
        .ok_or_else(|| CliError::NoPort {
            profile: ctx.profile.clone(),
        })
}

/// Connect to `port`, turning a failed connect into a CLI error.
pub async fn connect(controller: &Controller, port: &str) -> Result<(), CliError> {
    let status = controller.connect(port).await;
    if status.is_failed() {
        return Err(CliError::ConnectFailed {
            port: port.to_owned(),
            message: status.error_message.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Turn a failed request status into a CLI error.
pub fn ensure_ok(status: &RequestStatus) -> Result<(), CliError> {
    if status.is_failed() {
        return Err(CliError::RequestFailed {
            request: status.name.clone(),
            message: status.error_message.clone().unwrap_or_default(),
        });
    }
    Ok(())
}
