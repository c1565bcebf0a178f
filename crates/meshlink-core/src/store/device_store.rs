// ── Central device store ──
//
// Single owned home for everything the UI observes about the radio link.
// Each field is a `watch` channel: readers take cheap snapshots or
// subscribe; only the controller writes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::requests::RequestTracker;
use crate::model::{
    ConnectionState, DeviceSnapshot, LifecyclePhase, NodeNum, PortName, TopologyGraph,
};
use crate::stream::StateStream;

/// Reactive store for connection state, device data and request status.
pub struct DeviceStore {
    phase: watch::Sender<LifecyclePhase>,
    active_serial_port: watch::Sender<Option<PortName>>,
    device: watch::Sender<Option<Arc<DeviceSnapshot>>>,
    available_ports: watch::Sender<Arc<Vec<PortName>>>,
    active_node: watch::Sender<Option<NodeNum>>,
    topology: watch::Sender<Option<Arc<TopologyGraph>>>,
    last_device_update: watch::Sender<Option<DateTime<Utc>>>,
    requests: RequestTracker,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Disconnected);
        let (active_serial_port, _) = watch::channel(None);
        let (device, _) = watch::channel(None);
        let (available_ports, _) = watch::channel(Arc::new(Vec::new()));
        let (active_node, _) = watch::channel(None);
        let (topology, _) = watch::channel(None);
        let (last_device_update, _) = watch::channel(None);

        Self {
            phase,
            active_serial_port,
            device,
            available_ports,
            active_node,
            topology,
            last_device_update,
            requests: RequestTracker::new(),
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn active_serial_port(&self) -> Option<PortName> {
        self.active_serial_port.borrow().clone()
    }

    pub fn device(&self) -> Option<Arc<DeviceSnapshot>> {
        self.device.borrow().clone()
    }

    pub fn available_ports(&self) -> Arc<Vec<PortName>> {
        self.available_ports.borrow().clone()
    }

    pub fn active_node(&self) -> Option<NodeNum> {
        *self.active_node.borrow()
    }

    pub fn topology(&self) -> Option<Arc<TopologyGraph>> {
        self.topology.borrow().clone()
    }

    pub fn last_device_update(&self) -> Option<DateTime<Utc>> {
        *self.last_device_update.borrow()
    }

    /// The connection fields read together.
    pub fn connection(&self) -> ConnectionState {
        ConnectionState {
            active_serial_port: self.active_serial_port(),
            device: self.device(),
            available_ports: self.available_ports(),
        }
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_phase(&self) -> StateStream<LifecyclePhase> {
        StateStream::new(self.phase.subscribe())
    }

    pub fn subscribe_active_serial_port(&self) -> StateStream<Option<PortName>> {
        StateStream::new(self.active_serial_port.subscribe())
    }

    pub fn subscribe_device(&self) -> StateStream<Option<Arc<DeviceSnapshot>>> {
        StateStream::new(self.device.subscribe())
    }

    pub fn subscribe_available_ports(&self) -> StateStream<Arc<Vec<PortName>>> {
        StateStream::new(self.available_ports.subscribe())
    }

    pub fn subscribe_active_node(&self) -> StateStream<Option<NodeNum>> {
        StateStream::new(self.active_node.subscribe())
    }

    pub fn subscribe_topology(&self) -> StateStream<Option<Arc<TopologyGraph>>> {
        StateStream::new(self.topology.subscribe())
    }

    // ── Mutations (controller only) ──────────────────────────────────
    //
    // `send_replace` stores the value even when nobody is subscribed.

    pub(crate) fn set_phase(&self, phase: LifecyclePhase) {
        self.phase.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
    }

    pub(crate) fn set_active_serial_port(&self, port: Option<PortName>) {
        self.active_serial_port.send_replace(port);
    }

    pub(crate) fn replace_device(&self, snapshot: DeviceSnapshot) {
        self.device.send_replace(Some(Arc::new(snapshot)));
        self.last_device_update.send_replace(Some(Utc::now()));
    }

    pub(crate) fn set_available_ports(&self, ports: Vec<PortName>) {
        self.available_ports.send_replace(Arc::new(ports));
    }

    pub(crate) fn set_active_node(&self, node: Option<NodeNum>) {
        self.active_node.send_replace(node);
    }

    pub(crate) fn replace_topology(&self, graph: TopologyGraph) {
        self.topology.send_replace(Some(Arc::new(graph)));
    }

    /// Drop everything tied to the current link. Available ports survive.
    pub(crate) fn clear_connection(&self) {
        self.active_serial_port.send_replace(None);
        self.active_node.send_replace(None);
        self.device.send_replace(None);
        self.topology.send_replace(None);
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
