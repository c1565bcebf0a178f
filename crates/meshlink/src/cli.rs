//! Clap derive structures for the `meshlink` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshlink -- drive a serial-attached mesh radio through its backend
#[derive(Debug, Parser)]
#[command(
    name = "meshlink",
    version,
    about = "Connect to mesh radios and send messages from the command line",
    long_about = "Talks to a mesh radio over a serial port through the native\n\
        meshlink backend process: list ports, inspect the attached device,\n\
        watch live updates, and send text, waypoints or owner changes.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "MESHLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend executable (overrides profile)
    #[arg(long, short = 'b', env = "MESHLINK_BACKEND", global = true)]
    pub backend: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MESHLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List serial ports the backend can see
    #[command(alias = "p")]
    Ports,

    /// Show whether a device is attached and its current state
    #[command(alias = "st")]
    Status,

    /// Connect and print live device, topology and connection changes
    #[command(alias = "watch")]
    Monitor(MonitorArgs),

    /// Send a text message on a channel
    Send(SendArgs),

    /// Change the owner name broadcast by the device
    SetUser(SetUserArgs),

    /// Share a waypoint with the mesh
    #[command(alias = "wp")]
    Waypoint(WaypointArgs),

    /// Inspect and create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PortArg {
    /// Serial port (defaults to the profile's default_port)
    pub port: Option<String>,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub port: PortArg,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArg,

    /// Channel slot to send on
    #[arg(long, short = 'c', default_value_t = 0)]
    pub channel: u32,

    /// Message text
    #[arg(long, short = 't')]
    pub text: String,
}

#[derive(Debug, Args)]
pub struct SetUserArgs {
    #[command(flatten)]
    pub port: PortArg,

    /// Full owner name
    #[arg(long)]
    pub long_name: String,

    /// Short owner name shown on small displays
    #[arg(long)]
    pub short_name: String,

    /// Mark the owner as a licensed amateur radio operator
    #[arg(long)]
    pub licensed: bool,
}

#[derive(Debug, Args)]
pub struct WaypointArgs {
    #[command(flatten)]
    pub port: PortArg,

    /// Waypoint name
    #[arg(long)]
    pub name: String,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Longer description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Channel slot to share on
    #[arg(long, short = 'c', default_value_t = 0)]
    pub channel: u32,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
