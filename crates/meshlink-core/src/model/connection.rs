use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use meshlink_api::{DeviceSnapshot, PortName};

/// Phase of the connection state machine.
///
/// `Disconnected → Connecting → Connected → Disconnecting → Disconnected`.
/// A failure while `Connecting` falls straight back to `Disconnected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Point-in-time view of the connection fields held by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionState {
    /// `Some` iff a connect completed and no disconnect has completed since.
    pub active_serial_port: Option<PortName>,
    pub device: Option<Arc<DeviceSnapshot>>,
    pub available_ports: Arc<Vec<PortName>>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.active_serial_port.is_some()
    }
}
