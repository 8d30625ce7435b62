//! Application configuration for ReleaseKeeperApp.

use std::path::PathBuf;

use crate::config::{ConfigFile, VendorSettings};

/// Everything needed to start the application.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Directory holding one registry file per vendor.
    pub data_dir: PathBuf,

    /// Configured vendors, enabled or not.
    pub vendors: Vec<VendorSettings>,
}

impl AppConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            vendors: Vec::new(),
        }
    }

    /// Create application config from the configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            data_dir: config.general.data_dir.clone(),
            vendors: config.vendors.clone(),
        }
    }

    pub fn with_vendor(mut self, vendor: VendorSettings) -> Self {
        self.vendors.push(vendor);
        self
    }

    /// Registry file of a vendor.
    pub fn registry_path(&self, vendor: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", vendor))
    }

    pub fn vendor(&self, name: &str) -> Option<&VendorSettings> {
        self.vendors.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyKind;

    #[test]
    fn test_registry_path() {
        let config = AppConfig::new("/data");
        assert_eq!(config.registry_path("alpha"), PathBuf::from("/data/alpha.json"));
    }

    #[test]
    fn test_from_config_file() {
        let file = ConfigFile::parse(
            "[general]\ndata_dir = /d\n[vendor.a]\npolicy = pair\nstorage_root = /s\nmanifest = /m.json\n",
        )
        .unwrap();

        let config = AppConfig::from_config_file(&file);

        assert_eq!(config.data_dir, PathBuf::from("/d"));
        assert_eq!(config.vendor("a").unwrap().policy, PolicyKind::Pair);
        assert!(config.vendor("b").is_none());
    }
}
