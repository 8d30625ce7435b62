//! `[vendor.<name>]` sections.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::Properties;

use super::{expand_tilde, ConfigError};
use crate::policy::{
    AcquisitionPolicy, NaturalKeyShape, PolicyKind, DEFAULT_ACQUIRE_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_SECS,
};
use crate::presence::PathTemplate;
use crate::schedule::{default_schedule_time, Schedule, DEFAULT_SCHEDULE_DAY};

/// How a vendor's artifacts are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Copy from a drop folder or mounted share.
    #[default]
    Copy,
    /// Download over HTTP(S).
    Http,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(TransportKind::Copy),
            "http" => Ok(TransportKind::Http),
            other => Err(format!("unknown transport '{}', expected copy or http", other)),
        }
    }
}

/// Settings for one vendor.
#[derive(Debug, Clone)]
pub struct VendorSettings {
    pub name: String,
    pub enabled: bool,
    pub policy: PolicyKind,
    /// Overrides the preset's natural-key shape.
    pub key: Option<NaturalKeyShape>,
    pub storage_root: PathBuf,
    pub path_template: Option<PathTemplate>,
    pub sentinel_suffix: Option<String>,
    pub poll_interval: Duration,
    pub acquire_timeout: Duration,
    pub schedule: Schedule,
    /// JSON candidate manifest written by the vendor's scraper.
    pub manifest: PathBuf,
    pub transport: TransportKind,
    /// Root for relative copy sources.
    pub source_root: Option<PathBuf>,
    /// Base for relative HTTP sources.
    pub base_url: Option<String>,
    /// Overrides the preset threshold (pair and single only).
    pub min_members: Option<usize>,
    /// Shared-dependency artifact name (cycled only).
    pub shared_artifact: Option<String>,
}

impl VendorSettings {
    /// Minimal enabled settings with preset defaults.
    pub fn new(
        name: impl Into<String>,
        policy: PolicyKind,
        storage_root: impl Into<PathBuf>,
        manifest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            policy,
            key: None,
            storage_root: storage_root.into(),
            path_template: None,
            sentinel_suffix: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            schedule: Schedule::default(),
            manifest: manifest.into(),
            transport: TransportKind::default(),
            source_root: None,
            base_url: None,
            min_members: None,
            shared_artifact: None,
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_shared_artifact(mut self, name: impl Into<String>) -> Self {
        self.shared_artifact = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Section name in the config file.
    pub fn section(&self) -> String {
        format!("{}{}", super::VENDOR_SECTION_PREFIX, self.name)
    }

    /// Build the acquisition policy these settings describe.
    pub fn acquisition_policy(&self) -> AcquisitionPolicy {
        let shared = self.shared_artifact.as_deref().unwrap_or_default();
        let mut policy = AcquisitionPolicy::preset(self.policy, &self.name, shared)
            .with_poll_interval(self.poll_interval)
            .with_acquire_timeout(self.acquire_timeout);

        if let Some(shape) = self.key {
            policy = policy.with_key_shape(shape);
        }
        if let Some(template) = &self.path_template {
            policy = policy.with_path_template(template.clone());
        }
        if let Some(suffix) = &self.sentinel_suffix {
            policy = policy.with_sentinel_suffix(suffix.clone());
        }
        if let Some(min) = self.min_members {
            policy = policy.with_min_members(min);
        }
        policy
    }

    /// Parse a `[vendor.<name>]` section.
    pub(crate) fn from_section(name: &str, props: &Properties) -> Result<Self, ConfigError> {
        let section = format!("{}{}", super::VENDOR_SECTION_PREFIX, name);
        let reader = SectionReader {
            section: &section,
            props,
        };

        let policy: PolicyKind = reader.required("policy")?;
        let storage_root = expand_tilde(&reader.required::<String>("storage_root")?);
        let manifest = expand_tilde(&reader.required::<String>("manifest")?);
        let mut settings = VendorSettings::new(name, policy, storage_root, manifest);

        settings.enabled = reader.optional_bool("enabled")?.unwrap_or(true);
        settings.key = reader.optional("key")?;
        settings.path_template = reader
            .raw("path_template")
            .map(|raw| {
                PathTemplate::parse(raw)
                    .map_err(|e| reader.invalid("path_template", raw, e.to_string()))
            })
            .transpose()?;
        settings.sentinel_suffix = reader
            .raw("sentinel_suffix")
            .map(|raw| {
                if raw.is_empty() {
                    Err(reader.invalid("sentinel_suffix", raw, "must not be empty".into()))
                } else {
                    Ok(raw.to_string())
                }
            })
            .transpose()?;
        if let Some(secs) = reader.optional::<u64>("poll_interval_secs")? {
            if secs == 0 {
                return Err(reader.invalid("poll_interval_secs", "0", "must be at least 1".into()));
            }
            settings.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = reader.optional::<u64>("acquire_timeout_secs")? {
            if secs == 0 {
                return Err(reader.invalid("acquire_timeout_secs", "0", "must be at least 1".into()));
            }
            settings.acquire_timeout = Duration::from_secs(secs);
        }
        settings.schedule = reader.schedule()?;
        settings.transport = reader.optional("transport")?.unwrap_or_default();
        settings.source_root = reader.raw("source_root").map(expand_tilde);
        settings.base_url = reader.raw("base_url").map(str::to_string);
        settings.min_members = reader.optional("min_members")?;
        settings.shared_artifact = reader
            .raw("shared_artifact")
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        match settings.policy {
            PolicyKind::Cycled if settings.shared_artifact.is_none() => {
                return Err(ConfigError::MissingValue {
                    section,
                    key: "shared_artifact".to_string(),
                });
            }
            PolicyKind::Cycled if settings.min_members.is_some() => {
                return Err(reader.invalid(
                    "min_members",
                    reader.raw("min_members").unwrap_or_default(),
                    "not supported by the cycled policy".into(),
                ));
            }
            _ => {}
        }
        if settings.min_members == Some(0) {
            return Err(reader.invalid("min_members", "0", "must be at least 1".into()));
        }

        Ok(settings)
    }
}

struct SectionReader<'a> {
    section: &'a str,
    props: &'a Properties,
}

impl SectionReader<'_> {
    fn raw(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(str::trim)
    }

    fn invalid(&self, key: &str, value: &str, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }

    fn optional<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        match self.raw(key) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e: T::Err| self.invalid(key, raw, e.to_string())),
        }
    }

    fn required<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.optional(key)?.ok_or_else(|| ConfigError::MissingValue {
            section: self.section.to_string(),
            key: key.to_string(),
        })
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.raw(key).map(str::to_ascii_lowercase).as_deref() {
            None | Some("") => Ok(None),
            Some("true" | "yes" | "on" | "1") => Ok(Some(true)),
            Some("false" | "no" | "off" | "0") => Ok(Some(false)),
            Some(other) => Err(self.invalid(key, other, "expected true or false".into())),
        }
    }

    /// `every_secs` wins over `schedule_day` / `schedule_time`.
    fn schedule(&self) -> Result<Schedule, ConfigError> {
        if let Some(secs) = self.optional::<u64>("every_secs")? {
            return Schedule::every(Duration::from_secs(secs))
                .map_err(|e| self.invalid("every_secs", &secs.to_string(), e.to_string()));
        }

        let day = self.optional::<u32>("schedule_day")?.unwrap_or(DEFAULT_SCHEDULE_DAY);
        let time = match self.raw("schedule_time") {
            None | Some("") => default_schedule_time(),
            Some(raw) => Schedule::parse_time(raw)
                .map_err(|e| self.invalid("schedule_time", raw, e.to_string()))?,
        };
        Schedule::monthly(day, time)
            .map_err(|e| self.invalid("schedule_day", &day.to_string(), e.to_string()))
    }
}
