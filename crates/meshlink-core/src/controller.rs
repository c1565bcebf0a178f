// ── Controller ──
//
// Connection lifecycle manager and command workers. Full lifecycle:
// connect (disconnect first, init graph, open serial, record port,
// subscribe), event consumption, commands, disconnect. Every tracked entry
// point reports through the request tracker and never returns an error.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use meshlink_api::{Gateway, StdioTransport};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{Intent, RequestKind};
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{ChannelIndex, LifecyclePhase, NodeNum, PortName, RequestStatus, User, Waypoint};
use crate::store::DeviceStore;
use crate::stream::multiplexer::{EventChannels, Subscription, spawn_supervisor};

const ERROR_CHANNEL_SIZE: usize = 64;

// ── Controller ───────────────────────────────────────────────────────

/// Drives one backend and the device attached to it.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    gateway: Gateway,
    store: Arc<DeviceStore>,
    /// Supervisor for the current connection's event channels.
    subscription: Mutex<Option<Subscription>>,
    next_generation: AtomicU64,
    /// Bumped by every disconnect. A connect subscribes only if no
    /// disconnect ran after its own.
    epoch: AtomicU64,
    /// Unclassified errors (disconnect teardown) for the UI to surface.
    errors: broadcast::Sender<Arc<CoreError>>,
}

impl Controller {
    /// Create a controller over an existing gateway. Does not touch the backend.
    pub fn new(gateway: Gateway) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_SIZE);

        Self {
            inner: Arc::new(ControllerInner {
                gateway,
                store: Arc::new(DeviceStore::new()),
                subscription: Mutex::new(None),
                next_generation: AtomicU64::new(1),
                epoch: AtomicU64::new(0),
                errors,
            }),
        }
    }

    /// Spawn the configured backend process and wrap it in a controller.
    pub fn launch(config: &ControllerConfig) -> Result<Self, CoreError> {
        let transport = StdioTransport::spawn(&config.backend, config.request_timeout)?;
        Ok(Self::new(Gateway::new(Arc::new(transport))))
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    /// Subscribe to unclassified errors.
    pub fn errors(&self) -> broadcast::Receiver<Arc<CoreError>> {
        self.inner.errors.subscribe()
    }

    /// Whether the current connection's event loops are running.
    pub async fn is_subscribed(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(Subscription::is_running)
    }

    // ── Intent dispatch ──────────────────────────────────────────────

    /// Run the worker bound to `intent` as an independent task.
    ///
    /// Every dispatch gets its own task; nothing is debounced or queued
    /// behind an earlier intent of the same kind.
    pub fn dispatch(&self, intent: Intent) -> JoinHandle<()> {
        debug!(intent = intent.name(), "dispatching intent");
        let controller = self.clone();
        tokio::spawn(async move {
            match intent {
                Intent::QueryStatus => {
                    controller.query_status().await;
                }
                Intent::ListPorts => {
                    controller.list_ports().await;
                }
                Intent::Connect { port } => {
                    controller.connect(port).await;
                }
                Intent::Disconnect => controller.disconnect().await,
                Intent::SendMessage { channel, text } => {
                    controller.send_message(channel, text).await;
                }
                Intent::UpdateUser { user } => {
                    controller.update_user(user).await;
                }
                Intent::NewWaypoint { waypoint, channel } => {
                    controller.new_waypoint(waypoint, channel).await;
                }
                Intent::SelectNode { node } => controller.select_node(node),
            }
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Ask the backend whether a device is attached; if so, fetch its state.
    pub async fn query_status(&self) -> RequestStatus {
        self.track(RequestKind::DeviceConnectionStatus, self.fetch_status())
            .await
    }

    /// Refresh the list of serial ports. Independent of connection state.
    pub async fn list_ports(&self) -> RequestStatus {
        self.track(RequestKind::AvailablePorts, self.fetch_ports()).await
    }

    /// Connect to `port`, replacing any existing connection.
    ///
    /// The previous connection is always torn down before the backend sees
    /// any call for the new one. The port is recorded only after the serial
    /// link is open; event channels are opened only after that.
    pub async fn connect(&self, port: impl Into<PortName>) -> RequestStatus {
        let port = port.into();
        let name = RequestKind::Connect.as_str();
        let store = &self.inner.store;
        let requests = store.requests();

        requests.begin(name);
        self.disconnect().await;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        store.set_phase(LifecyclePhase::Connecting);
        debug!(port = %port, "connecting");

        if let Err(e) = self.open_link(&port).await {
            warn!(port = %port, error = %e, "connect failed");
            store.set_phase(LifecyclePhase::Disconnected);
            requests.fail(name, e.to_string());
            return requests.status(name);
        }

        store.set_active_serial_port(Some(port.clone()));
        store.set_phase(LifecyclePhase::Connected);
        requests.succeed(name);
        info!(port = %port, "connected");

        if let Err(e) = self.subscribe_all(epoch).await {
            warn!(port = %port, error = %e, "event subscription failed, dropping connection");
            requests.fail(name, e.to_string());
            self.disconnect().await;
        }

        requests.status(name)
    }

    /// Close the serial link and clear all connection state.
    ///
    /// Local state is cleared whether or not the backend call succeeds. A
    /// backend failure is logged and published on [`errors()`](Self::errors).
    pub async fn disconnect(&self) {
        let store = &self.inner.store;
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        // Stop the event loops before anything is cleared.
        let subscription = self.inner.subscription.lock().await.take();
        if let Some(subscription) = subscription {
            subscription.stop();
        }

        let was_connected = store.phase() != LifecyclePhase::Disconnected;
        if was_connected {
            store.set_phase(LifecyclePhase::Disconnecting);
        }

        if let Err(e) = self.inner.gateway.disconnect_from_serial_port().await {
            let err = CoreError::Disconnect {
                message: e.to_string(),
            };
            warn!(error = %err, "backend disconnect failed, clearing local state anyway");
            let _ = self.inner.errors.send(Arc::new(err));
        }

        store.clear_connection();
        store.set_phase(LifecyclePhase::Disconnected);
        if was_connected {
            info!("disconnected");
        }
    }

    /// Select a node in the device's node database, or clear the selection.
    pub fn select_node(&self, node: Option<NodeNum>) {
        self.inner.store.set_active_node(node);
    }

    // ── Command workers ──────────────────────────────────────────────

    pub async fn send_message(&self, channel: ChannelIndex, text: impl Into<String>) -> RequestStatus {
        let text = text.into();
        let call = self.inner.gateway.send_text(channel, &text);
        self.track(RequestKind::SendMessage, async { call.await.map_err(CoreError::from) })
            .await
    }

    pub async fn update_user(&self, user: User) -> RequestStatus {
        let call = self.inner.gateway.update_device_user(&user);
        self.track(RequestKind::UpdateUser, async { call.await.map_err(CoreError::from) })
            .await
    }

    pub async fn new_waypoint(&self, waypoint: Waypoint, channel: ChannelIndex) -> RequestStatus {
        let call = self.inner.gateway.send_waypoint(&waypoint, channel);
        self.track(RequestKind::NewWaypoint, async { call.await.map_err(CoreError::from) })
            .await
    }

    // ── Internal helpers ─────────────────────────────────────────────

    /// Pending → run `work` → Successful or Failed(message).
    async fn track<F>(&self, kind: RequestKind, work: F) -> RequestStatus
    where
        F: Future<Output = Result<(), CoreError>>,
    {
        let name = kind.as_str();
        let requests = self.inner.store.requests();

        requests.begin(name);
        match work.await {
            Ok(()) => requests.succeed(name),
            Err(e) => {
                warn!(request = name, error = %e, "request failed");
                requests.fail(name, e.to_string());
            }
        }
        requests.status(name)
    }

    async fn fetch_status(&self) -> Result<(), CoreError> {
        if self.inner.gateway.check_device_connected().await? {
            let snapshot = self.inner.gateway.request_device_state().await?;
            self.inner.store.replace_device(snapshot);
        } else {
            debug!("backend reports no device attached");
        }
        Ok(())
    }

    async fn fetch_ports(&self) -> Result<(), CoreError> {
        let ports = self.inner.gateway.get_all_serial_ports().await?;
        debug!(count = ports.len(), "serial ports listed");
        self.inner.store.set_available_ports(ports);
        Ok(())
    }

    async fn open_link(&self, port: &str) -> Result<(), CoreError> {
        self.inner.gateway.initialize_graph_state(port).await?;
        self.inner.gateway.connect_to_serial_port(port).await?;
        Ok(())
    }

    /// Open all three event channels and start consuming them.
    ///
    /// If a disconnect ran since `epoch` was read, the freshly opened
    /// channels are dropped instead.
    async fn subscribe_all(&self, epoch: u64) -> Result<(), CoreError> {
        let channels = EventChannels::open(&self.inner.gateway).await?;

        // Held until the subscription is stored: a disconnect either bumped
        // the epoch already or will find and stop this subscription.
        let mut current = self.inner.subscription.lock().await;
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!("connection closed while opening event channels, dropping them");
            return Ok(());
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(&self.inner);
        let subscription = spawn_supervisor(
            generation,
            channels,
            Arc::clone(&self.inner.store),
            move || spawn_device_lost(weak, generation),
        );

        if let Some(previous) = current.replace(subscription) {
            previous.stop();
        }
        Ok(())
    }

    /// Tear down after the backend reported the device gone, unless the
    /// connection that saw the event has already been replaced.
    async fn handle_device_lost(&self, generation: u64) {
        let current = self
            .inner
            .subscription
            .lock()
            .await
            .as_ref()
            .map(Subscription::generation);
        if current != Some(generation) {
            debug!(generation, "ignoring device loss from a replaced connection");
            return;
        }
        self.disconnect().await;
    }
}

/// Runs outside the supervisor, since disconnect stops the supervisor.
fn spawn_device_lost(inner: Weak<ControllerInner>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let controller = Controller { inner };
    tokio::spawn(async move {
        controller.handle_device_lost(generation).await;
    });
}
