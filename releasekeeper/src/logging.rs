//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a log directory is given, to a daily-rolling
//! file written by a background worker. The returned [`LogGuard`] must be
//! kept alive for the file writer to flush.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, time::LocalTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "releasekeeper=info";

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "releasekeeper=debug";

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "releasekeeper.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Keeps the non-blocking file writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<LogGuard, LoggingError> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(LocalTime::rfc_3339());

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter(verbose))
            .with(stderr_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
        return Ok(LogGuard { _file: None });
    };

    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339());

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LogGuard { _file: Some(guard) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter_ignores_env() {
        assert_eq!(env_filter(true).to_string(), VERBOSE_FILTER);
    }

    #[test]
    fn test_second_init_fails_and_creates_log_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("logs");

        let first = init_logging(Some(&dir), false);
        assert!(dir.is_dir());

        // Another test binary thread may have installed a subscriber first.
        if let Ok(_guard) = first {
            assert!(matches!(
                init_logging(None, false),
                Err(LoggingError::Init(_))
            ));
        }
    }
}
