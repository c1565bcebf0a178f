//! `meshlink monitor`: stream connection, device and topology changes.

use serde::Serialize;

use meshlink_core::LifecyclePhase;

use super::{Context, util};
use crate::cli::{MonitorArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum MonitorEvent {
    Connected { port: String },
    Device { version: u32, nodes: usize, owner: Option<String> },
    Topology { features: Option<usize> },
    Error { message: String },
    DeviceLost { port: String },
    Stopped,
}

impl MonitorEvent {
    fn describe(&self) -> String {
        match self {
            Self::Connected { port } => format!("connected to {port}"),
            Self::Device { version, nodes, owner } => {
                let owner = owner.as_deref().unwrap_or("unknown owner");
                format!("device update v{version}: {nodes} nodes, {owner}")
            }
            Self::Topology { features: Some(n) } => format!("topology update: {n} links"),
            Self::Topology { features: None } => "topology update".into(),
            Self::Error { message } => format!("error: {message}"),
            Self::DeviceLost { port } => format!("device on {port} disconnected"),
            Self::Stopped => "stopped".into(),
        }
    }
}

pub async fn handle(ctx: &Context<'_>, args: &MonitorArgs) -> Result<(), CliError> {
    let port = util::resolve_port(&args.port, ctx)?;
    let controller = &ctx.controller;

    util::connect(controller, &port).await?;
    emit(ctx, &MonitorEvent::Connected { port: port.clone() })?;

    let store = controller.store();
    let mut phase = store.subscribe_phase();
    let mut device = store.subscribe_device();
    let mut topology = store.subscribe_topology();
    let mut errors = controller.errors();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                controller.disconnect().await;
                emit(ctx, &MonitorEvent::Stopped)?;
                break;
            }
            Some(current) = phase.changed() => {
                if current == LifecyclePhase::Disconnected {
                    emit(ctx, &MonitorEvent::DeviceLost { port: port.clone() })?;
                    break;
                }
            }
            Some(Some(snapshot)) = device.changed() => {
                emit(ctx, &MonitorEvent::Device {
                    version: snapshot.version,
                    nodes: snapshot.node_db.len(),
                    owner: snapshot.owner.as_ref().map(|u| u.long_name.clone()),
                })?;
            }
            Some(Some(graph)) = topology.changed() => {
                emit(ctx, &MonitorEvent::Topology { features: feature_count(&graph) })?;
            }
            Ok(err) = errors.recv() => {
                emit(ctx, &MonitorEvent::Error { message: err.to_string() })?;
            }
            else => break,
        }
    }
    Ok(())
}

/// Edge count of a GeoJSON-style feature collection, if that's what it is.
fn feature_count(graph: &serde_json::Value) -> Option<usize> {
    graph.get("features")?.as_array().map(Vec::len)
}

/// One line per event: JSON in structured modes, timestamped text otherwise.
fn emit(ctx: &Context<'_>, event: &MonitorEvent) -> Result<(), CliError> {
    let line = match ctx.global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(event)?,
        OutputFormat::Table | OutputFormat::Plain => {
            let color = output::should_color(ctx.global.color);
            let stamp = chrono::Local::now().format("%H:%M:%S").to_string();
            format!("{} {}", output::dim(&stamp, color), event.describe())
        }
    };
    output::print_output(&line, ctx.global.quiet);
    Ok(())
}
