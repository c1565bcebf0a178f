//! Commands that connect, perform one radio action, and disconnect.

use meshlink_core::{RequestStatus, User, Waypoint};

use super::{Context, util};
use crate::cli::{SendArgs, SetUserArgs, WaypointArgs};
use crate::error::CliError;
use crate::output;

pub async fn send(ctx: &Context<'_>, args: SendArgs) -> Result<(), CliError> {
    if args.text.trim().is_empty() {
        return Err(CliError::Validation {
            field: "text".into(),
            reason: "message must not be empty".into(),
        });
    }
    let port = util::resolve_port(&args.port, ctx)?;

    util::connect(&ctx.controller, &port).await?;
    let status = ctx.controller.send_message(args.channel, args.text).await;
    finish(ctx, &status, &format!("Message sent on channel {} via {port}", args.channel)).await
}

pub async fn set_user(ctx: &Context<'_>, args: SetUserArgs) -> Result<(), CliError> {
    let port = util::resolve_port(&args.port, ctx)?;
    let user = User {
        long_name: args.long_name,
        short_name: args.short_name,
        is_licensed: args.licensed,
        ..User::default()
    };
    let summary = format!("Owner set to {} ({})", user.long_name, user.short_name);

    util::connect(&ctx.controller, &port).await?;
    let status = ctx.controller.update_user(user).await;
    finish(ctx, &status, &summary).await
}

pub async fn waypoint(ctx: &Context<'_>, args: WaypointArgs) -> Result<(), CliError> {
    if !(-90.0..=90.0).contains(&args.lat) {
        return Err(CliError::Validation {
            field: "lat".into(),
            reason: format!("{} is outside -90..=90", args.lat),
        });
    }
    if !(-180.0..=180.0).contains(&args.lon) {
        return Err(CliError::Validation {
            field: "lon".into(),
            reason: format!("{} is outside -180..=180", args.lon),
        });
    }
    let port = util::resolve_port(&args.port, ctx)?;
    let waypoint = Waypoint {
        description: args.description,
        ..Waypoint::at(args.name, args.lat, args.lon)
    };
    let summary = format!(
        "Waypoint '{}' shared at {:.5}, {:.5} on channel {}",
        waypoint.name,
        waypoint.latitude(),
        waypoint.longitude(),
        args.channel
    );

    util::connect(&ctx.controller, &port).await?;
    let status = ctx.controller.new_waypoint(waypoint, args.channel).await;
    finish(ctx, &status, &summary).await
}

/// Disconnect, then report the request outcome.
async fn finish(ctx: &Context<'_>, status: &RequestStatus, summary: &str) -> Result<(), CliError> {
    ctx.controller.disconnect().await;
    util::ensure_ok(status)?;

    let out = output::render_single(ctx.global.output, status, |_| summary.to_owned(), |s| {
        s.state.to_string()
    })?;
    output::print_output(&out, ctx.global.quiet);
    Ok(())
}
