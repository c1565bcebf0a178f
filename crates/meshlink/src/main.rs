mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meshlink_config::{Config, ConfigError};
use meshlink_core::{Controller, ControllerConfig};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::commands::Context;
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Config supplies the fallback log level, so load it before tracing
    let config = meshlink_config::load_config();
    let fallback_level = config.as_ref().map_or("warn", |c| c.defaults.log_level.as_str());
    init_tracing(cli.global.verbose, fallback_level);

    // Dispatch and handle errors with proper exit codes
    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(err) => Err(err.into()),
    };
    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, fallback: &str) {
    let filter = match verbosity {
        0 => fallback,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, config: Config) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend
        Command::Config(args) => commands::config_cmd::handle(&args, &config, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "meshlink", &mut std::io::stdout());
            Ok(())
        }

        // All other commands drive the backend
        cmd => {
            let (profile, controller_config) = build_controller_config(&cli.global, &config)?;
            let controller = Controller::launch(&controller_config).map_err(|e| {
                CliError::BackendUnavailable {
                    program: controller_config.backend.program.display().to_string(),
                    reason: e.to_string(),
                }
            })?;

            let ctx = Context {
                controller,
                profile,
                default_port: controller_config.default_port,
                global: &cli.global,
            };
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &ctx).await
        }
    }
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
fn build_controller_config(
    global: &GlobalOpts,
    config: &Config,
) -> Result<(String, ControllerConfig), CliError> {
    let (name, profile) =
        meshlink_config::resolve_profile(config, global.profile.as_deref()).map_err(|e| match e {
            ConfigError::UnknownProfile { profile } => {
                let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
                names.sort_unstable();
                CliError::ProfileNotFound {
                    name: profile,
                    available: if names.is_empty() {
                        "(none)".into()
                    } else {
                        names.join(", ")
                    },
                }
            }
            other => other.into(),
        })?;

    let mut controller_config = meshlink_config::profile_to_controller_config(&profile, &config.defaults)?;
    if let Some(program) = &global.backend {
        controller_config.backend.program.clone_from(program);
    }
    Ok((name, controller_config))
}
