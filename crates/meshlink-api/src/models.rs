// ── Backend wire models ──
//
// Shapes exchanged with the backend. The device snapshot is treated as
// opaque by the core: it is stored and forwarded whole, and unknown fields
// survive a decode/encode cycle.

use serde::{Deserialize, Serialize};

/// Serial port identifier as reported by the backend (e.g. `COM3`, `/dev/ttyUSB0`).
pub type PortName = String;

/// Mesh node number.
pub type NodeNum = u32;

/// Channel slot index on the radio.
pub type ChannelIndex = u32;

/// The backend's view of the connected device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSnapshot {
    pub my_node: Option<serde_json::Value>,
    pub owner: Option<User>,
    pub node_db: Vec<serde_json::Value>,
    pub receive_queue: Vec<serde_json::Value>,
    pub version: u32,
    pub rx_text_message: Option<serde_json::Value>,
    pub no_save: bool,
    pub did_gps_reset: bool,
    /// Anything newer backends send that this build does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Owner identity broadcast by a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub long_name: String,
    pub short_name: String,
    pub macaddr: Vec<u8>,
    pub hw_model: i32,
    pub is_licensed: bool,
}

/// A named map location shared over the mesh.
///
/// Coordinates use the radio's fixed-point encoding (degrees × 1e7).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Waypoint {
    pub id: u32,
    pub latitude_i: i32,
    pub longitude_i: i32,
    /// Expiry as seconds since the epoch; 0 never expires.
    pub expire: u32,
    /// Node allowed to edit the waypoint; 0 lets anyone.
    pub locked_to: NodeNum,
    pub name: String,
    pub description: String,
    /// Unicode code point used as the map marker.
    pub icon: u32,
}

const COORD_SCALE: f64 = 1e7;

impl Waypoint {
    /// Build a waypoint from floating-point degrees.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn at(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude_i: (latitude * COORD_SCALE).round() as i32,
            longitude_i: (longitude * COORD_SCALE).round() as i32,
            ..Self::default()
        }
    }

    pub fn latitude(&self) -> f64 {
        f64::from(self.latitude_i) / COORD_SCALE
    }

    pub fn longitude(&self) -> f64 {
        f64::from(self.longitude_i) / COORD_SCALE
    }
}
