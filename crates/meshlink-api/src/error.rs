use thiserror::Error;

use crate::channel::EventKind;

/// Top-level error type for the `meshlink-api` crate.
///
/// `meshlink-core` folds the request/response variants into a single
/// command error carrying the display text verbatim, so the `#[error]`
/// strings here are what ends up in front of the user.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// No backend process, or the transport to it is gone.
    #[error("{0}")]
    BackendUnavailable(String),

    /// Backend I/O failure while writing a request.
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Commands ────────────────────────────────────────────────────
    /// The backend answered a command with an error payload.
    #[error("{message}")]
    CommandRejected { command: String, message: String },

    // ── Event channels ──────────────────────────────────────────────
    /// A push subscription could not be established.
    #[error("failed to open {channel} channel: {reason}")]
    ChannelOpen { channel: EventKind, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// A response or event payload did not match the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable(reason.into())
    }

    pub(crate) fn deserialization(err: &serde_json::Error, body: &serde_json::Value) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: body.to_string(),
        }
    }

    /// Whether the error means the backend itself is unreachable, as
    /// opposed to a well-formed rejection of one command.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Io(_))
    }
}
