//! Application error types.

use std::fmt;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::registry::RegistryError;

/// Errors that can occur while starting the application.
#[derive(Debug)]
pub enum AppError {
    /// Failed to create the registry data directory.
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open a vendor registry.
    Registry {
        vendor: String,
        source: RegistryError,
    },

    /// Configuration error.
    Config(ConfigError),

    /// No vendor with this name is configured.
    UnknownVendor(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DataDir { path, source } => {
                write!(
                    f,
                    "Failed to create data directory {}: {}",
                    path.display(),
                    source
                )
            }
            AppError::Registry { vendor, source } => {
                write!(f, "Failed to open registry for '{}': {}", vendor, source)
            }
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::UnknownVendor(name) => write!(f, "Unknown vendor '{}'", name),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::DataDir { source, .. } => Some(source),
            AppError::Registry { source, .. } => Some(source),
            AppError::Config(e) => Some(e),
            AppError::UnknownVendor(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_app_error_display() {
        let err = AppError::UnknownVendor("delta".to_string());
        assert_eq!(err.to_string(), "Unknown vendor 'delta'");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_app_error_from_config_error() {
        let config_err = ConfigError::DuplicateVendor("alpha".to_string());
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(_)));
        assert!(app_err.to_string().contains("Configuration error"));
        assert!(app_err.source().is_some());
    }
}
