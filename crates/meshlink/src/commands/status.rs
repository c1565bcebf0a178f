//! `meshlink status`

use std::fmt::Write;
use std::sync::Arc;

use serde::Serialize;

use meshlink_core::DeviceSnapshot;

use super::{Context, util};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StatusView {
    connected: bool,
    device: Option<Arc<DeviceSnapshot>>,
}

pub async fn handle(ctx: &Context<'_>) -> Result<(), CliError> {
    let status = ctx.controller.query_status().await;
    util::ensure_ok(&status)?;

    let device = ctx.controller.store().device();
    let view = StatusView {
        connected: device.is_some(),
        device,
    };
    let color = output::should_color(ctx.global.color);

    let out = output::render_single(
        ctx.global.output,
        &view,
        |v| detail(v, color),
        |v| if v.connected { "connected".into() } else { "disconnected".into() },
    )?;
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}

fn detail(view: &StatusView, color: bool) -> String {
    let Some(device) = &view.device else {
        return format!("Device:   {}", output::status_word("not connected", false, color));
    };

    let mut out = format!("Device:   {}", output::status_word("connected", true, color));
    if let Some(owner) = &device.owner {
        let _ = write!(out, "\nOwner:    {} ({})", owner.long_name, owner.short_name);
    }
    let _ = write!(out, "\nNodes:    {}", device.node_db.len());
    let _ = write!(out, "\nQueued:   {}", device.receive_queue.len());
    let _ = write!(
        out,
        "\nVersion:  {}",
        output::dim(&device.version.to_string(), color)
    );
    out
}
