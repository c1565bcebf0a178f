// ── Core error types ──
//
// The gateway distinguishes an unreachable backend from a rejected
// command; the core does not. Both become `Command` with the backend's
// text carried verbatim, which is what lands in a failed RequestStatus.

use meshlink_api::EventKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend ──────────────────────────────────────────────────────
    /// Any request/response failure against the backend.
    #[error("{message}")]
    Command { message: String },

    /// An event subscription could not be established. Aborts a connect.
    /// Renders exactly as the gateway's error does.
    #[error("failed to open {channel} channel: {reason}")]
    ChannelOpen { channel: EventKind, reason: String },

    /// Closing the serial link failed. Reported, never blocks local cleanup.
    #[error("Disconnect failed: {message}")]
    Disconnect { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from gateway errors ───────────────────────────────────

impl From<meshlink_api::Error> for CoreError {
    fn from(err: meshlink_api::Error) -> Self {
        match err {
            meshlink_api::Error::ChannelOpen { channel, reason } => {
                CoreError::ChannelOpen { channel, reason }
            }
            other => CoreError::Command {
                message: other.to_string(),
            },
        }
    }
}
