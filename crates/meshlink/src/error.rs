//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use meshlink_config::ConfigError;
use meshlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Backend / connection ─────────────────────────────────────────
    #[error("Could not start backend '{program}': {reason}")]
    #[diagnostic(
        code(meshlink::backend_unavailable),
        help(
            "Check that the backend is installed and executable.\n\
             Set it with --backend, MESHLINK_BACKEND, or `program` in your profile."
        )
    )]
    BackendUnavailable { program: String, reason: String },

    #[error("Could not connect to {port}: {message}")]
    #[diagnostic(
        code(meshlink::connect_failed),
        help("Check the cable and that no other program holds the port.\nRun: meshlink ports")
    )]
    ConnectFailed { port: String, message: String },

    #[error("No serial port given")]
    #[diagnostic(
        code(meshlink::no_port),
        help(
            "Pass the port as an argument, or set default_port in profile '{profile}'.\n\
             Run: meshlink ports"
        )
    )]
    NoPort { profile: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("{request} failed: {message}")]
    #[diagnostic(code(meshlink::request_failed))]
    RequestFailed { request: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(meshlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(meshlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Inspect with: meshlink config show"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(meshlink::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(meshlink::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(meshlink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BackendUnavailable { .. } | Self::ConnectFailed { .. } => exit_code::CONNECTION,
            Self::NoPort { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Config(_) | Self::ConfigExists { .. } => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other => CliError::RequestFailed {
                request: "backend".into(),
                message: other.to_string(),
            },
        }
    }
}
