//! `meshlink ports`

use serde::Serialize;
use tabled::Tabled;

use super::{Context, util};
use crate::error::CliError;
use crate::output;

#[derive(Serialize, Tabled)]
struct PortRow {
    #[tabled(rename = "PORT")]
    port: String,
}

pub async fn handle(ctx: &Context<'_>) -> Result<(), CliError> {
    let status = ctx.controller.list_ports().await;
    util::ensure_ok(&status)?;

    let ports = ctx.controller.store().available_ports();
    let out = output::render_list(
        ctx.global.output,
        ports.as_slice(),
        |p| PortRow { port: p.clone() },
        String::clone,
    )?;
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}
