//! INI configuration file.
//!
//! The file lives at `<config_dir>/releasekeeper/config.ini` unless a path
//! is given explicitly:
//!
//! ```text
//! [general]
//! data_dir = ~/.releasekeeper/registry
//! log_dir = ~/.releasekeeper/logs
//!
//! [vendor.alpha]
//! policy = pair
//! storage_root = /srv/refdata/alpha
//! manifest = /var/lib/scrapers/alpha.json
//! schedule_day = 3
//! schedule_time = 06:00
//! ```
//!
//! Every invalid value is reported with its section and key.

mod vendor;

pub use vendor::{TransportKind, VendorSettings};

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::warn;

/// Prefix of per-vendor section names.
pub const VENDOR_SECTION_PREFIX: &str = "vendor.";

const GENERAL_SECTION: &str = "general";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("[{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("[{section}] is missing required key '{key}'")]
    MissingValue { section: String, key: String },

    #[error("vendor '{0}' is defined more than once")]
    DuplicateVendor(String),
}

/// Default config directory: `<config_dir>/releasekeeper`.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("releasekeeper")
}

/// Default config file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn data_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".releasekeeper")
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(raw: &str) -> PathBuf {
    let raw = raw.trim();
    match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(raw),
        },
        _ => PathBuf::from(raw),
    }
}

/// `[general]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralSettings {
    /// Directory holding one registry file per vendor.
    pub data_dir: PathBuf,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: data_home().join("registry"),
            log_dir: data_home().join("logs"),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub general: GeneralSettings,
    /// Vendors in file order.
    pub vendors: Vec<VendorSettings>,
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = ConfigFile::default();

        for (section, props) in ini.iter() {
            match section {
                None => {}
                Some(GENERAL_SECTION) => {
                    for (key, value) in props.iter() {
                        match key {
                            "data_dir" => config.general.data_dir = expand_tilde(value),
                            "log_dir" => config.general.log_dir = expand_tilde(value),
                            other => warn!(section = GENERAL_SECTION, key = other, "Unknown config key"),
                        }
                    }
                }
                Some(name) => match name.strip_prefix(VENDOR_SECTION_PREFIX) {
                    Some(vendor) if !vendor.is_empty() => {
                        if config.vendor(vendor).is_some() {
                            return Err(ConfigError::DuplicateVendor(vendor.to_string()));
                        }
                        config
                            .vendors
                            .push(VendorSettings::from_section(vendor, props)?);
                    }
                    _ => warn!(section = name, "Unknown config section"),
                },
            }
        }

        Ok(config)
    }

    pub fn vendor(&self, name: &str) -> Option<&VendorSettings> {
        self.vendors.iter().find(|v| v.name == name)
    }

    /// Registry file of a vendor.
    pub fn registry_path(&self, vendor: &str) -> PathBuf {
        self.general.data_dir.join(format!("{}.json", vendor))
    }

    /// Effective settings as `(section, key, value)` rows, for display.
    pub fn entries(&self) -> Vec<(String, &'static str, String)> {
        let general = GENERAL_SECTION.to_string();
        let mut rows = vec![
            (general.clone(), "data_dir", self.general.data_dir.display().to_string()),
            (general, "log_dir", self.general.log_dir.display().to_string()),
        ];

        for vendor in &self.vendors {
            let section = vendor.section();
            let opt = |value: Option<String>| value.unwrap_or_default();
            let mut push = |key: &'static str, value: String| {
                rows.push((section.clone(), key, value));
            };
            push("enabled", vendor.enabled.to_string());
            push("policy", vendor.policy.to_string());
            push("storage_root", vendor.storage_root.display().to_string());
            push(
                "path_template",
                vendor.acquisition_policy().path_template.as_str().to_string(),
            );
            push("sentinel_suffix", vendor.acquisition_policy().sentinel_suffix);
            push("poll_interval_secs", vendor.poll_interval.as_secs().to_string());
            push("acquire_timeout_secs", vendor.acquire_timeout.as_secs().to_string());
            push("schedule", vendor.schedule.to_string());
            push("manifest", vendor.manifest.display().to_string());
            push(
                "transport",
                match vendor.transport {
                    TransportKind::Copy => "copy".to_string(),
                    TransportKind::Http => "http".to_string(),
                },
            );
            push(
                "source_root",
                opt(vendor.source_root.as_ref().map(|p| p.display().to_string())),
            );
            push("base_url", opt(vendor.base_url.clone()));
            push("min_members", opt(vendor.min_members.map(|m| m.to_string())));
            push("shared_artifact", opt(vendor.shared_artifact.clone()));
        }

        rows
    }
}
