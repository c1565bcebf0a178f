//! Device connection and event orchestration for a serial-attached mesh radio.
//!
//! This crate sits between `meshlink-api` (the backend gateway) and UI
//! consumers:
//!
//! - **[`Controller`]**: Connection lifecycle manager and command workers.
//!   [`connect()`](Controller::connect) always disconnects first, then
//!   initializes backend graph state, opens the serial link, records the
//!   active port, and only then subscribes to the backend's push events.
//!   [`dispatch()`](Controller::dispatch) runs any UI [`Intent`] as an
//!   independent task.
//!
//! - **[`DeviceStore`]**: Single owned store of connection state (active
//!   port, device snapshot, available ports, node selection, topology) and
//!   the per-command [`RequestTracker`]. Consumers read snapshots or
//!   subscribe through `watch` channels; only the controller writes.
//!
//! - **Event multiplexer** ([`stream`]): Opens the device-update,
//!   device-disconnect and graph-update channels all-or-nothing and runs one
//!   consumption loop per channel under a supervising task that is stopped
//!   on disconnect.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Intent, RequestKind};
pub use config::{BackendProgram, ControllerConfig};
pub use controller::Controller;
pub use error::CoreError;
pub use store::{DeviceStore, RequestTracker};
pub use stream::StateStream;

pub use model::{
    ChannelIndex, ConnectionState, DeviceSnapshot, LifecyclePhase, NodeNum, PortName,
    RequestState, RequestStatus, User, Waypoint,
};
