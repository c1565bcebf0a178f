// ── Runtime controller configuration ──
//
// Describes *how* to reach the backend. Never touches disk: the CLI (via
// `meshlink-config`) builds a `ControllerConfig` and hands it in.

use std::time::Duration;

pub use meshlink_api::BackendProgram;

use crate::model::PortName;

/// Default backend executable, resolved through `PATH`.
pub const DEFAULT_BACKEND_PROGRAM: &str = "meshlink-backend";

/// Configuration for driving a single backend process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// How to launch the backend.
    pub backend: BackendProgram,
    /// Per-request timeout enforced by the transport. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Port used when a command needs a connection and none was given.
    pub default_port: Option<PortName>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backend: BackendProgram::new(DEFAULT_BACKEND_PROGRAM),
            request_timeout: Some(Duration::from_secs(30)),
            default_port: None,
        }
    }
}
