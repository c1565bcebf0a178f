// ── Event channel multiplexer ──
//
// Opens the three backend push channels for one connection and consumes
// them concurrently under a single supervising task. The task is stopped
// by cancelling its token; every loop checks the token before applying
// an event, so a stopped connection never writes into the store again.

use std::sync::Arc;

use meshlink_api::{DeviceSnapshot, EventChannel, EventKind, Gateway};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::store::DeviceStore;

/// The three channels of one connection, opened all-or-nothing.
pub(crate) struct EventChannels {
    device_update: EventChannel,
    device_disconnect: EventChannel,
    graph_update: EventChannel,
}

impl EventChannels {
    /// Open device-update, device-disconnect and graph-update, in that order.
    ///
    /// A failure drops whatever was already opened and returns the error;
    /// no partial subscription is ever handed out.
    pub(crate) async fn open(gateway: &Gateway) -> Result<Self, CoreError> {
        let device_update = gateway.open_channel(EventKind::DeviceUpdate).await?;
        let device_disconnect = gateway.open_channel(EventKind::DeviceDisconnect).await?;
        let graph_update = gateway.open_channel(EventKind::GraphUpdate).await?;

        debug!("event channels open");
        Ok(Self {
            device_update,
            device_disconnect,
            graph_update,
        })
    }
}

/// Handle on a running supervisor. Dropping it does not stop the task.
pub(crate) struct Subscription {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    /// Stop consuming. Does not wait for the task; in-flight loop bodies
    /// see the cancelled token and discard their event.
    pub(crate) fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
        debug!(generation = self.generation, "event subscription stopped");
    }
}

/// Spawn the supervisor consuming `channels` into `store`.
///
/// `on_device_lost` runs at most once, when the backend reports the device
/// gone. It must not wait on this subscription.
pub(crate) fn spawn_supervisor<F>(
    generation: u64,
    channels: EventChannels,
    store: Arc<DeviceStore>,
    on_device_lost: F,
) -> Subscription
where
    F: FnOnce() + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        let EventChannels {
            device_update,
            device_disconnect,
            graph_update,
        } = channels;

        tokio::join!(
            device_update_loop(device_update, &store, &token),
            device_disconnect_loop(device_disconnect, &token, on_device_lost),
            graph_update_loop(graph_update, &store, &token),
        );
        debug!(generation, "event loops finished");
    });

    Subscription {
        generation,
        cancel,
        handle,
    }
}

// ── Consumption loops ────────────────────────────────────────────────

async fn device_update_loop(mut channel: EventChannel, store: &DeviceStore, cancel: &CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = channel.recv_as::<DeviceSnapshot>() => {
                let Some(decoded) = next else {
                    debug!("device-update channel closed");
                    break;
                };
                if cancel.is_cancelled() {
                    break;
                }
                match decoded {
                    Ok(snapshot) => store.replace_device(snapshot),
                    Err(e) => warn!(error = %e, "dropping undecodable device update"),
                }
            }
        }
    }
}

async fn device_disconnect_loop<F>(mut channel: EventChannel, cancel: &CancellationToken, on_device_lost: F)
where
    F: FnOnce(),
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        next = channel.recv() => {
            if next.is_none() {
                debug!("device-disconnect channel closed");
            } else if !cancel.is_cancelled() {
                info!("backend reported device disconnect");
                on_device_lost();
            }
        }
    }
}

async fn graph_update_loop(mut channel: EventChannel, store: &DeviceStore, cancel: &CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = channel.recv() => {
                let Some(graph) = next else {
                    debug!("graph-update channel closed");
                    break;
                };
                if cancel.is_cancelled() {
                    break;
                }
                store.replace_topology(graph);
            }
        }
    }
}
