//! Shared configuration for the meshlink front ends.
//!
//! TOML profiles layered with environment overrides, and translation of a
//! profile into `meshlink_core::ControllerConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meshlink_core::config::DEFAULT_BACKEND_PROGRAM;
use meshlink_core::{BackendProgram, ControllerConfig};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "MESHLINK_CONFIG";

const ENV_PREFIX: &str = "MESHLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' is not defined")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// Tracing filter used when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_output")]
    pub output: String,

    /// Seconds to wait for any backend reply; 0 waits forever.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            output: default_output(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}
fn default_output() -> String {
    "plain".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// A named backend profile.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Backend executable; looked up on `PATH` when relative.
    pub program: Option<PathBuf>,

    /// Extra arguments passed to the backend.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Serial port used when a command names none.
    pub default_port: Option<String>,

    /// Override `defaults.request_timeout`.
    pub request_timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `MESHLINK_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("dev", "meshlink", "meshlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("meshlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore, e.g.
/// `MESHLINK_DEFAULTS__REQUEST_TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config", "profile", "backend", "output"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// A starter config with one profile pointing at the stock backend.
pub fn starter_config() -> Config {
    let mut cfg = Config::default();
    cfg.profiles.insert(
        "default".into(),
        Profile {
            program: Some(PathBuf::from(DEFAULT_BACKEND_PROGRAM)),
            ..Profile::default()
        },
    );
    cfg
}

// ── Profile resolution ──────────────────────────────────────────────

/// Pick the profile to run with.
///
/// An explicitly named profile must exist. Without a name the configured
/// default is used, falling back to an empty profile when the config
/// defines none, so a bare install still runs against the stock backend.
pub fn resolve_profile(cfg: &Config, requested: Option<&str>) -> Result<(String, Profile), ConfigError> {
    if let Some(name) = requested {
        return cfg
            .profiles
            .get(name)
            .map(|p| (name.to_owned(), p.clone()))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.to_owned(),
            });
    }

    let name = cfg.default_profile.clone().unwrap_or_else(|| "default".into());
    let profile = cfg.profiles.get(&name).cloned().unwrap_or_default();
    Ok((name, profile))
}

/// Build a `ControllerConfig` from a profile without CLI flag overrides.
pub fn profile_to_controller_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let program = profile
        .program
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKEND_PROGRAM));
    if program.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            field: "program".into(),
            reason: "backend program must not be empty".into(),
        });
    }

    if profile
        .default_port
        .as_deref()
        .is_some_and(|port| port.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            field: "default_port".into(),
            reason: "port name must not be blank".into(),
        });
    }

    let timeout_secs = profile.request_timeout.unwrap_or(defaults.request_timeout);
    let request_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

    Ok(ControllerConfig {
        backend: BackendProgram {
            program,
            args: profile.args.clone(),
        },
        request_timeout,
        default_port: profile.default_port.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.request_timeout, 30);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profiles_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "bench"

[defaults]
request_timeout = 10

[profiles.bench]
program = "/opt/meshlink/backend"
args = ["--baud", "115200"]
default_port = "/dev/ttyUSB0"
request_timeout = 0
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        let (name, profile) = resolve_profile(&cfg, None).unwrap();
        assert_eq!(name, "bench");
        assert_eq!(profile.args, vec!["--baud", "115200"]);

        let controller = profile_to_controller_config(&profile, &cfg.defaults).unwrap();
        assert_eq!(controller.backend.program, PathBuf::from("/opt/meshlink/backend"));
        assert_eq!(controller.default_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(controller.request_timeout, None);
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = starter_config();

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.profiles, cfg.profiles);
    }

    #[test]
    fn named_profile_must_exist() {
        let err = resolve_profile(&Config::default(), Some("field")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { ref profile } if profile == "field"));
    }

    #[test]
    fn empty_config_runs_stock_backend() {
        let cfg = Config::default();
        let (name, profile) = resolve_profile(&cfg, None).unwrap();
        assert_eq!(name, "default");

        let controller = profile_to_controller_config(&profile, &cfg.defaults).unwrap();
        assert_eq!(controller.backend, BackendProgram::new(DEFAULT_BACKEND_PROGRAM));
        assert_eq!(controller.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn blank_default_port_is_rejected() {
        let profile = Profile {
            default_port: Some("  ".into()),
            ..Profile::default()
        };
        let err = profile_to_controller_config(&profile, &Defaults::default()).unwrap_err();
        assert!(err.to_string().contains("default_port"));
    }
}
