//! ReleaseKeeper CLI - Command-line interface
//!
//! This binary runs the vendor services, triggers one-off passes and
//! inspects the per-vendor registries.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use releasekeeper::config::ConfigFile;
use releasekeeper::logging::{init_logging, LogGuard};

use crate::commands::config::ConfigCommands;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "releasekeeper", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/releasekeeper/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every enabled vendor on its schedule until Ctrl+C
    Run {
        /// Seconds between status lines
        #[arg(long, default_value_t = 30)]
        status_interval: u64,
    },

    /// Run a single pass for one vendor and exit
    Pass {
        /// Vendor name as configured in [vendor.<name>]
        vendor: String,
    },

    /// Show bundles recorded in the registries
    Status {
        /// Only show this vendor
        vendor: Option<String>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
        Commands::Status { vendor } => {
            let config = load_config(cli.config.as_deref())?;
            commands::status::run(&config, vendor.as_deref())
        }
        Commands::Run { status_interval } => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = logging(&config, cli.verbose)?;
            commands::run::run(&config, status_interval)
        }
        Commands::Pass { vendor } => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = logging(&config, cli.verbose)?;
            commands::pass::run(&config, &vendor)
        }
    }
}

/// Load the configuration from an explicit path or the default location.
pub(crate) fn load_config(path: Option<&std::path::Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

fn logging(config: &ConfigFile, verbose: bool) -> Result<LogGuard, CliError> {
    Ok(init_logging(Some(&config.general.log_dir), verbose)?)
}
