// meshlink-api: Async gateway to the native mesh-radio backend process.
//
// Every request/response call and every push-event subscription crosses
// the `Gateway`. The gateway owns no state; the transport underneath it is
// pluggable (stdio JSON-lines to a child process by default).

pub mod channel;
pub mod error;
pub mod gateway;
pub mod models;
pub mod protocol;
pub mod stdio;
pub mod transport;

pub use channel::{EventChannel, EventKind};
pub use error::Error;
pub use gateway::Gateway;
pub use models::{ChannelIndex, DeviceSnapshot, NodeNum, PortName, User, Waypoint};
pub use protocol::Method;
pub use stdio::{BackendProgram, StdioTransport};
pub use transport::Transport;
