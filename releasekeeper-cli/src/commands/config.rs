//! Configuration CLI commands.
//!
//! Provides `config list` and `config path` for inspecting the effective
//! settings from the command line.

use std::path::Path;

use clap::Subcommand;
use releasekeeper::config::config_file_path;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// List all effective configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, explicit: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::List => run_list(explicit),
        ConfigCommands::Path => run_path(explicit),
    }
}

fn run_list(explicit: Option<&Path>) -> Result<(), CliError> {
    let config = crate::load_config(explicit)?;

    let mut current_section = String::new();
    for (section, key, value) in config.entries() {
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }
        if value.is_empty() {
            println!("  {} = (not set)", key);
        } else {
            println!("  {} = {}", key, value);
        }
    }

    if config.vendors.is_empty() {
        println!();
        println!("No vendors configured.");
    }
    Ok(())
}

fn run_path(explicit: Option<&Path>) -> Result<(), CliError> {
    let path = explicit.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    println!("{}", path.display());
    Ok(())
}
