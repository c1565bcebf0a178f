//! Typed gateway over a [`Transport`].
//!
//! One method per backend command. The gateway owns no state and performs
//! no retries: each method is exactly one transport round-trip.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::channel::{EventChannel, EventKind};
use crate::error::Error;
use crate::models::{ChannelIndex, DeviceSnapshot, PortName, User, Waypoint};
use crate::protocol::Method;
use crate::transport::Transport;

/// Cheaply cloneable handle to the backend.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    // ── Device status ───────────────────────────────────────────────

    pub async fn check_device_connected(&self) -> Result<bool, Error> {
        self.call(Method::CheckDeviceConnected, serde_json::Value::Null)
            .await
    }

    pub async fn request_device_state(&self) -> Result<DeviceSnapshot, Error> {
        self.call(Method::RequestDeviceState, serde_json::Value::Null)
            .await
    }

    pub async fn get_all_serial_ports(&self) -> Result<Vec<PortName>, Error> {
        self.call(Method::GetAllSerialPorts, serde_json::Value::Null)
            .await
    }

    // ── Connection ──────────────────────────────────────────────────

    pub async fn initialize_graph_state(&self, port: &str) -> Result<(), Error> {
        self.call_unit(Method::InitializeGraphState, json!({ "portName": port }))
            .await
    }

    pub async fn connect_to_serial_port(&self, port: &str) -> Result<(), Error> {
        self.call_unit(Method::ConnectToSerialPort, json!({ "portName": port }))
            .await
    }

    pub async fn disconnect_from_serial_port(&self) -> Result<(), Error> {
        self.call_unit(Method::DisconnectFromSerialPort, serde_json::Value::Null)
            .await
    }

    // ── Mesh operations ─────────────────────────────────────────────

    pub async fn send_text(&self, channel: ChannelIndex, text: &str) -> Result<(), Error> {
        self.call_unit(Method::SendText, json!({ "channel": channel, "text": text }))
            .await
    }

    pub async fn update_device_user(&self, user: &User) -> Result<(), Error> {
        self.call_unit(Method::UpdateDeviceUser, json!({ "user": user }))
            .await
    }

    pub async fn send_waypoint(&self, waypoint: &Waypoint, channel: ChannelIndex) -> Result<(), Error> {
        self.call_unit(
            Method::SendWaypoint,
            json!({ "waypoint": waypoint, "channel": channel }),
        )
        .await
    }

    // ── Event channels ──────────────────────────────────────────────

    /// Open one push subscription. Callers open channels only while a
    /// device connection is active, and reopen them after every reconnect.
    pub async fn open_channel(&self, kind: EventKind) -> Result<EventChannel, Error> {
        let channel = self.transport.listen(kind).await?;
        debug!(channel = %kind, "event channel opened");
        Ok(channel)
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn call<T: DeserializeOwned>(&self, method: Method, args: serde_json::Value) -> Result<T, Error> {
        let value = self.transport.invoke(method.as_str(), args).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::deserialization(&e, &value))
    }

    async fn call_unit(&self, method: Method, args: serde_json::Value) -> Result<(), Error> {
        self.transport.invoke(method.as_str(), args).await.map(drop)
    }
}
