//! Config subcommand handlers.

use meshlink_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let out = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(cfg)?,
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(cfg).map_err(config::ConfigError::from)?
                }
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            let written = config::save_config(&config::starter_config())?;
            if !global.quiet {
                eprintln!("Wrote {}", written.display());
            }
            Ok(())
        }
    }
}
