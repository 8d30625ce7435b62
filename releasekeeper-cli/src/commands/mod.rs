//! CLI subcommands.

pub mod config;
pub mod pass;
pub mod run;
pub mod status;

use crate::error::CliError;

/// Build the multi-threaded runtime used by the async commands.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}
