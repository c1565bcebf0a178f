// ── Transport seam ──
//
// The gateway talks to the backend through this trait so the wire can be
// swapped (child-process stdio in production, scripted fakes in tests).

use async_trait::async_trait;

use crate::channel::{EventChannel, EventKind};
use crate::error::Error;

/// A request/response + push-event peer.
///
/// Implementations perform no retries, buffering beyond per-channel FIFO
/// delivery, deduplication, or reconnection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Invoke `command` with JSON `args` and wait for its result.
    async fn invoke(&self, command: &str, args: serde_json::Value) -> Result<serde_json::Value, Error>;

    /// Open a push subscription for `kind`.
    async fn listen(&self, kind: EventKind) -> Result<EventChannel, Error>;
}
