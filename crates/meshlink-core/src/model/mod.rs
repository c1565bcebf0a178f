// ── Domain model ──
//
// Wire-level records (device snapshot, user, waypoint) are owned by the
// gateway crate and re-exported here; the core adds the request-status and
// connection shapes it writes into the store.

mod connection;
mod request;

pub use connection::{ConnectionState, LifecyclePhase};
pub use request::{RequestState, RequestStatus};

pub use meshlink_api::{ChannelIndex, DeviceSnapshot, NodeNum, PortName, User, Waypoint};

/// Last topology payload pushed by the backend. Opaque to the core.
pub type TopologyGraph = serde_json::Value;
