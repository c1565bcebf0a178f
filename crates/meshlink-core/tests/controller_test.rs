// Integration tests for the controller lifecycle, driven by a scripted
// in-process backend.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use meshlink_api::{Error, EventChannel, EventKind, Gateway, Transport};
use meshlink_core::{
    Controller, CoreError, DeviceStore, Intent, LifecyclePhase, RequestState, User, Waypoint,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

// ── Scripted backend ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Call {
    command: String,
    args: Value,
    /// Port the store reported when the backend saw this call.
    active_port: Option<String>,
}

#[derive(Default)]
struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    results: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    refused: Mutex<HashSet<EventKind>>,
    feeds: Mutex<HashMap<EventKind, Vec<mpsc::UnboundedSender<Value>>>>,
    store: Mutex<Option<Arc<DeviceStore>>>,
}

impl FakeBackend {
    fn respond(&self, command: &str, result: Value) {
        self.results.lock().unwrap().insert(command.to_owned(), result);
    }

    fn fail(&self, command: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(command.to_owned(), message.to_owned());
    }

    fn refuse(&self, kind: EventKind) {
        self.refused.lock().unwrap().insert(kind);
    }

    /// Make `command` wait until the returned gate is notified. Event
    /// channels are held with `listen:<kind>`.
    fn hold(&self, command: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(command.to_owned(), Arc::clone(&gate));
        gate
    }

    /// Push an event on the most recently opened channel of `kind`.
    fn push(&self, kind: EventKind, payload: Value) {
        let feeds = self.feeds.lock().unwrap();
        let tx = feeds.get(&kind).and_then(|f| f.last()).unwrap();
        tx.send(payload).unwrap();
    }

    /// Senders of every channel of `kind` ever opened, oldest first.
    fn feeds_of(&self, kind: EventKind) -> Vec<mpsc::UnboundedSender<Value>> {
        self.feeds
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of event kinds whose latest channel still has a live receiver.
    fn open_channels(&self) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.last().is_some_and(|tx| !tx.is_closed()))
            .count()
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    fn record(&self, command: String, args: Value) {
        let active_port = self
            .store
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|s| s.active_serial_port());
        self.calls.lock().unwrap().push(Call {
            command,
            args,
            active_port,
        });
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, Error> {
        self.record(command.to_owned(), args);

        let gate = self.gates.lock().unwrap().get(command).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failure = self.failures.lock().unwrap().get(command).cloned();
        if let Some(message) = failure {
            return Err(Error::CommandRejected {
                command: command.to_owned(),
                message,
            });
        }
        let result = self.results.lock().unwrap().get(command).cloned();
        Ok(result.unwrap_or(Value::Null))
    }

    async fn listen(&self, kind: EventKind) -> Result<EventChannel, Error> {
        let key = format!("listen:{kind}");
        self.record(key.clone(), Value::Null);

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.refused.lock().unwrap().contains(&kind) {
            return Err(Error::ChannelOpen {
                channel: kind,
                reason: "listener refused".into(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().entry(kind).or_default().push(tx);
        Ok(EventChannel::new(kind, rx))
    }
}

fn setup() -> (Controller, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::default());
    let controller = Controller::new(Gateway::new(backend.clone()));
    *backend.store.lock().unwrap() = Some(Arc::clone(controller.store()));
    (controller, backend)
}

async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("timed out")
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn wait_disconnected(controller: &Controller) {
    let mut port = controller.store().subscribe_active_serial_port();
    within(port.wait_for(Option::is_none)).await.unwrap();
    let mut phase = controller.store().subscribe_phase();
    within(phase.wait_for(|p| *p == LifecyclePhase::Disconnected))
        .await
        .unwrap();
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_runs_backend_steps_in_order() {
    let (controller, backend) = setup();

    let status = controller.connect("COM3").await;

    assert_eq!(status.state, RequestState::Successful);
    assert_eq!(status.name, "connect");
    assert!(status.error_message.is_none());
    assert_eq!(
        backend.commands(),
        vec![
            "disconnect_from_serial_port",
            "initialize_graph_state",
            "connect_to_serial_port",
            "listen:device_update",
            "listen:device_disconnect",
            "listen:graph_update",
        ]
    );

    let calls = backend.calls();
    assert_eq!(calls[1].args, json!({ "portName": "COM3" }));
    assert_eq!(calls[2].args, json!({ "portName": "COM3" }));
    // The port is recorded after the link opens and before subscribing.
    assert_eq!(calls[2].active_port, None);
    assert_eq!(calls[3].active_port.as_deref(), Some("COM3"));

    let store = controller.store();
    assert_eq!(store.active_serial_port().as_deref(), Some("COM3"));
    assert_eq!(store.phase(), LifecyclePhase::Connected);
    assert!(controller.is_subscribed().await);
    assert_eq!(backend.open_channels(), 3);
}

#[tokio::test]
async fn test_connect_fails_when_graph_init_is_rejected() {
    let (controller, backend) = setup();
    backend.fail("initialize_graph_state", "Port COM9 not found");

    let status = controller.connect("COM9").await;

    assert_eq!(status.state, RequestState::Failed);
    assert_eq!(status.error_message.as_deref(), Some("Port COM9 not found"));
    assert_eq!(
        backend.commands(),
        vec!["disconnect_from_serial_port", "initialize_graph_state"]
    );
    assert!(controller.store().active_serial_port().is_none());
    assert_eq!(controller.store().phase(), LifecyclePhase::Disconnected);
    assert!(!controller.is_subscribed().await);
}

#[tokio::test]
async fn test_connect_fails_when_serial_open_is_rejected() {
    let (controller, backend) = setup();
    backend.fail("connect_to_serial_port", "Access is denied");

    let status = controller.connect("COM3").await;

    assert_eq!(status.state, RequestState::Failed);
    assert_eq!(status.error_message.as_deref(), Some("Access is denied"));
    assert!(!backend.commands().iter().any(|c| c.starts_with("listen:")));
    assert!(controller.store().active_serial_port().is_none());
    assert_eq!(
        controller.store().requests().status("connect").state,
        RequestState::Failed
    );
}

#[tokio::test]
async fn test_connect_is_pending_until_link_opens() {
    let (controller, backend) = setup();
    let gate = backend.hold("connect_to_serial_port");

    let handle = controller.dispatch(Intent::Connect { port: "COM3".into() });
    let mut phase = controller.store().subscribe_phase();
    within(phase.wait_for(|p| *p == LifecyclePhase::Connecting))
        .await
        .unwrap();
    settle().await;

    assert!(controller.store().requests().status("connect").is_pending());
    assert!(controller.store().active_serial_port().is_none());

    gate.notify_one();
    within(handle).await.unwrap();

    assert!(controller.store().requests().status("connect").is_successful());
    assert_eq!(
        controller.store().active_serial_port().as_deref(),
        Some("COM3")
    );
}

#[tokio::test]
async fn test_reconnect_disconnects_before_new_backend_calls() {
    let (controller, backend) = setup();
    controller.connect("COM3").await;
    controller.connect("COM4").await;

    let calls = backend.calls();
    let second_init = calls
        .iter()
        .rposition(|c| c.command == "initialize_graph_state")
        .unwrap();
    assert_eq!(calls[second_init].args, json!({ "portName": "COM4" }));
    assert_eq!(calls[second_init].active_port, None);
    assert_eq!(calls[second_init - 1].command, "disconnect_from_serial_port");
    assert_eq!(calls[second_init - 1].active_port.as_deref(), Some("COM3"));

    assert_eq!(
        controller.store().active_serial_port().as_deref(),
        Some("COM4")
    );
    assert!(controller.is_subscribed().await);
}

#[tokio::test]
async fn test_channel_open_failure_leaves_device_disconnected() {
    let (controller, backend) = setup();
    backend.refuse(EventKind::GraphUpdate);

    let status = controller.connect("COM3").await;

    assert_eq!(status.state, RequestState::Failed);
    assert_eq!(
        status.error_message.as_deref(),
        Some("failed to open graph_update channel: listener refused")
    );
    assert!(controller.store().active_serial_port().is_none());
    assert_eq!(controller.store().phase(), LifecyclePhase::Disconnected);
    assert!(!controller.is_subscribed().await);
    // Channels opened before the failure were abandoned.
    assert_eq!(backend.open_channels(), 0);
    assert_eq!(backend.count("disconnect_from_serial_port"), 2);
}

#[tokio::test]
async fn test_disconnect_while_subscribing_drops_new_channels() {
    let (controller, backend) = setup();
    let gate = backend.hold("listen:graph_update");

    let connecting = controller.dispatch(Intent::Connect { port: "COM3".into() });
    within(async {
        while backend.count("listen:graph_update") == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await;

    controller.disconnect().await;
    gate.notify_one();
    within(connecting).await.unwrap();

    assert!(!controller.is_subscribed().await);
    assert_eq!(backend.open_channels(), 0);

    // Nothing pushed on the abandoned channels reaches the store.
    for tx in backend.feeds_of(EventKind::DeviceUpdate) {
        let _ = tx.send(json!({ "version": 42 }));
    }
    settle().await;

    let store = controller.store();
    assert!(store.device().is_none());
    assert!(store.active_serial_port().is_none());
    assert_eq!(store.phase(), LifecyclePhase::Disconnected);
}

// ── Disconnect ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_clears_state_when_backend_fails() {
    let (controller, backend) = setup();
    controller.connect("COM3").await;
    controller.select_node(Some(0xdead_beef));
    backend.push(EventKind::DeviceUpdate, json!({ "version": 1 }));
    let mut device = controller.store().subscribe_device();
    within(device.wait_for(Option::is_some)).await.unwrap();

    backend.fail("disconnect_from_serial_port", "port vanished");
    let mut errors = controller.errors();
    controller.disconnect().await;

    let store = controller.store();
    assert!(store.active_serial_port().is_none());
    assert!(store.device().is_none());
    assert!(store.active_node().is_none());
    assert_eq!(store.phase(), LifecyclePhase::Disconnected);
    assert!(!controller.is_subscribed().await);

    let err = errors.try_recv().unwrap();
    assert!(matches!(&*err, CoreError::Disconnect { message } if message == "port vanished"));
    // Teardown failures never go through the tracker.
    let names: Vec<String> = store.requests().snapshot().keys().cloned().collect();
    assert_eq!(names, vec!["connect".to_owned()]);
}

#[tokio::test]
async fn test_disconnect_when_idle_is_harmless() {
    let (controller, backend) = setup();
    controller.disconnect().await;
    controller.disconnect().await;

    assert_eq!(backend.count("disconnect_from_serial_port"), 2);
    assert!(controller.store().active_serial_port().is_none());
    assert_eq!(controller.store().phase(), LifecyclePhase::Disconnected);
}

// ── Event channels ──────────────────────────────────────────────────

#[tokio::test]
async fn test_device_updates_last_one_wins() {
    let (controller, backend) = setup();
    controller.connect("COM3").await;

    for version in 1..=3 {
        backend.push(EventKind::DeviceUpdate, json!({ "version": version }));
    }

    let mut device = controller.store().subscribe_device();
    within(device.wait_for(|d| d.as_ref().is_some_and(|d| d.version == 3)))
        .await
        .unwrap();
    settle().await;
    assert_eq!(controller.store().device().unwrap().version, 3);
}

#[tokio::test]
async fn test_graph_update_is_stored() {
    let (controller, backend) = setup();
    controller.connect("COM3").await;

    let graph = json!({ "type": "FeatureCollection", "features": [] });
    backend.push(EventKind::GraphUpdate, graph.clone());

    let mut topology = controller.store().subscribe_topology();
    let stored = within(topology.wait_for(Option::is_some)).await.unwrap();
    assert_eq!(*stored.unwrap(), graph);
}

#[tokio::test]
async fn test_device_disconnect_event_matches_user_disconnect() {
    let (controller, backend) = setup();
    controller.connect("COM3").await;
    controller.select_node(Some(7));
    backend.push(EventKind::DeviceUpdate, json!({ "version": 4 }));
    let mut device = controller.store().subscribe_device();
    within(device.wait_for(Option::is_some)).await.unwrap();

    backend.push(EventKind::DeviceDisconnect, Value::Null);
    wait_disconnected(&controller).await;

    let store = controller.store();
    assert!(store.device().is_none());
    assert!(store.active_node().is_none());
    assert!(store.topology().is_none());
    assert!(!controller.is_subscribed().await);
    assert_eq!(backend.count("disconnect_from_serial_port"), 2);
}

#[tokio::test]
async fn test_stale_channels_do_not_reach_new_connection() {
    let (controller, backend) = setup();
    controller.connect("COM3").await;
    let old_updates = backend.feeds_of(EventKind::DeviceUpdate);
    let old_drops = backend.feeds_of(EventKind::DeviceDisconnect);

    controller.connect("COM4").await;
    let _ = old_updates[0].send(json!({ "version": 99 }));
    let _ = old_drops[0].send(Value::Null);
    settle().await;

    let store = controller.store();
    assert_eq!(store.active_serial_port().as_deref(), Some("COM4"));
    assert!(store.device().is_none());
    assert!(controller.is_subscribed().await);
    assert_eq!(backend.open_channels(), 3);
}

// ── Query and command workers ───────────────────────────────────────

#[tokio::test]
async fn test_query_status_fetches_snapshot_when_connected() {
    let (controller, backend) = setup();
    backend.respond("check_device_connected", json!(true));
    backend.respond(
        "request_device_state",
        json!({ "version": 5, "noSave": true, "firmwareEdition": "vanilla" }),
    );

    let status = controller.query_status().await;

    assert_eq!(status.state, RequestState::Successful);
    assert_eq!(status.name, "device_connection_status");
    let device = controller.store().device().unwrap();
    assert_eq!(device.version, 5);
    assert!(device.no_save);
    assert_eq!(device.extra["firmwareEdition"], json!("vanilla"));
}

#[tokio::test]
async fn test_query_status_skips_fetch_when_nothing_attached() {
    let (controller, backend) = setup();
    backend.respond("check_device_connected", json!(false));

    let status = controller.query_status().await;

    assert_eq!(status.state, RequestState::Successful);
    assert_eq!(backend.commands(), vec!["check_device_connected"]);
    assert!(controller.store().device().is_none());
}

#[tokio::test]
async fn test_query_status_failure_is_tracked() {
    let (controller, backend) = setup();
    backend.fail("check_device_connected", "backend process is not running");

    let status = controller.query_status().await;

    assert_eq!(status.state, RequestState::Failed);
    assert_eq!(
        status.error_message.as_deref(),
        Some("backend process is not running")
    );
}

#[tokio::test]
async fn test_list_ports_failure_is_tracked() {
    let (controller, backend) = setup();
    backend.respond("get_all_serial_ports", json!(["COM3"]));
    controller.list_ports().await;

    backend.fail("get_all_serial_ports", "backend process is not running");
    let status = controller.list_ports().await;

    assert_eq!(status.name, "available_ports");
    assert_eq!(status.state, RequestState::Failed);
    assert_eq!(
        status.error_message.as_deref(),
        Some("backend process is not running")
    );
    assert_eq!(*controller.store().available_ports(), vec!["COM3".to_owned()]);
}

#[tokio::test]
async fn test_failing_commands_report_backend_message() {
    let (controller, backend) = setup();
    backend.fail("send_text", "Channel 7 does not exist");
    backend.fail("update_device_user", "Short name too long");
    backend.fail("send_waypoint", "Radio is busy");

    let sent = controller.send_message(7, "hello").await;
    let user = controller
        .update_user(User {
            long_name: "Base Camp".into(),
            short_name: "BASECAMP".into(),
            ..User::default()
        })
        .await;
    let waypoint = controller
        .new_waypoint(Waypoint::at("Trailhead", 47.6, -122.3), 0)
        .await;

    for (status, message) in [
        (sent, "Channel 7 does not exist"),
        (user, "Short name too long"),
        (waypoint, "Radio is busy"),
    ] {
        assert_eq!(status.state, RequestState::Failed);
        assert_eq!(status.error_message.as_deref(), Some(message));
        assert_eq!(controller.store().requests().status(&status.name), status);
    }
    // Workers never touch connection state.
    assert_eq!(controller.store().phase(), LifecyclePhase::Disconnected);
}

#[tokio::test]
async fn test_command_is_pending_while_in_flight() {
    let (controller, backend) = setup();
    let gate = backend.hold("send_text");

    let handle = controller.dispatch(Intent::SendMessage {
        channel: 0,
        text: "ping".into(),
    });
    within(async {
        while !controller.store().requests().status("send_message").is_pending() {
            tokio::task::yield_now().await;
        }
    })
    .await;

    gate.notify_one();
    within(handle).await.unwrap();

    assert!(
        controller
            .store()
            .requests()
            .status("send_message")
            .is_successful()
    );
    assert_eq!(
        backend.calls()[0].args,
        json!({ "channel": 0, "text": "ping" })
    );
}

#[tokio::test]
async fn test_dispatched_intents_run_independently() {
    let (controller, backend) = setup();
    backend.respond("get_all_serial_ports", json!(["/dev/ttyUSB0"]));
    backend.respond("check_device_connected", json!(false));
    backend.fail("send_text", "not connected");

    let handles = vec![
        controller.dispatch(Intent::ListPorts),
        controller.dispatch(Intent::QueryStatus),
        controller.dispatch(Intent::SendMessage {
            channel: 0,
            text: "hi".into(),
        }),
        controller.dispatch(Intent::SelectNode { node: Some(3) }),
    ];
    for handle in handles {
        within(handle).await.unwrap();
    }

    let requests = controller.store().requests();
    assert!(requests.status("available_ports").is_successful());
    assert!(requests.status("device_connection_status").is_successful());
    assert!(requests.status("send_message").is_failed());
    assert_eq!(requests.status("update_user").state, RequestState::Idle);
    assert_eq!(
        *controller.store().available_ports(),
        vec!["/dev/ttyUSB0".to_owned()]
    );
    assert_eq!(controller.store().active_node(), Some(3));
}

// ── End-to-end scenario ─────────────────────────────────────────────

#[tokio::test]
async fn test_connect_device_drop_then_list_ports() {
    let (controller, backend) = setup();
    backend.respond("get_all_serial_ports", json!(["COM3", "COM4"]));

    let connect = controller.connect("COM3").await;
    assert_eq!(connect.state, RequestState::Successful);
    assert_eq!(
        controller.store().active_serial_port().as_deref(),
        Some("COM3")
    );

    backend.push(EventKind::DeviceDisconnect, Value::Null);
    wait_disconnected(&controller).await;
    assert!(controller.store().device().is_none());

    let ports = controller.list_ports().await;
    assert_eq!(ports.state, RequestState::Successful);
    assert_eq!(
        *controller.store().available_ports(),
        vec!["COM3".to_owned(), "COM4".to_owned()]
    );
    assert_eq!(
        controller.store().requests().status("available_ports").state,
        RequestState::Successful
    );
}
