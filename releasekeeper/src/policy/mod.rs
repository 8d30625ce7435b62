//! Per-vendor acquisition policies.
//!
//! An [`AcquisitionPolicy`] is the only thing that differs between vendor
//! pipelines besides the injected adapter and transport. It decides:
//!
//! - how a descriptor's natural key is rendered ([`NaturalKeyShape`])
//! - how descriptors group into bundles ([`GroupingShape`])
//! - when a bundle is complete ([`ReadinessRule`])
//! - where artifacts live on disk and how in-flight transfers are marked
//! - how often completion is polled and how long a transfer may take
//!
//! # Presets
//!
//! | Preset | Grouping | Rule |
//! |---|---|---|
//! | [`AcquisitionPolicy::pair`] | period | ≥ 2 members, all on disk |
//! | [`AcquisitionPolicy::single`] | period | ≥ 1 member, all on disk |
//! | [`AcquisitionPolicy::cycled`] | period + cycle | N: ≥ 6; O: ≥ 4 and N sibling holds the shared artifact |
//!
//! # Example
//!
//! ```ignore
//! use releasekeeper::policy::AcquisitionPolicy;
//!
//! let policy = AcquisitionPolicy::cycled("charts", "shared_terrain.dat")
//!     .with_poll_interval(Duration::from_secs(2));
//! ```

mod rules;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::model::{ArtifactDescriptor, GroupingKey, NaturalKey};
use crate::presence::PathTemplate;

pub use rules::{CrossBundleDependency, ReadinessRule};

// =============================================================================
// Defaults
// =============================================================================

/// Default completion-sentinel poll interval (seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default upper bound for a single acquisition (seconds).
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3600;

/// Default suffix of the partial-file marker written by transports.
pub const DEFAULT_SENTINEL_SUFFIX: &str = ".part";

/// Default on-disk layout: `<root>/<year>/<month>/<name>`.
pub const DEFAULT_PATH_TEMPLATE: &str = "{year}/{month}/{name}";

/// Default on-disk layout for cycled vendors.
pub const DEFAULT_CYCLED_PATH_TEMPLATE: &str = "{year}/{month}/{cycle}/{name}";

/// Minimum members for the pair preset.
pub const PAIR_MIN_MEMBERS: usize = 2;

/// Minimum members for the single-artifact preset.
pub const SINGLE_MIN_MEMBERS: usize = 1;

/// Cycle name of the primary variant in the cycled preset.
pub const CYCLE_PRIMARY: &str = "N";

/// Cycle name of the dependent variant in the cycled preset.
pub const CYCLE_DEPENDENT: &str = "O";

/// Minimum members of the primary variant.
pub const CYCLE_PRIMARY_MIN_MEMBERS: usize = 6;

/// Minimum members of the dependent variant.
pub const CYCLE_DEPENDENT_MIN_MEMBERS: usize = 4;

// =============================================================================
// Shapes
// =============================================================================

/// How an artifact's natural key is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NaturalKeyShape {
    /// Composite of file name, period and (when grouped by it) cycle.
    NamePeriod,
    /// Identifier assigned by the remote side.
    RemoteId,
}

impl FromStr for NaturalKeyShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name_period" | "name-period" => Ok(Self::NamePeriod),
            "remote_id" | "remote-id" => Ok(Self::RemoteId),
            other => Err(format!("unknown key shape '{}'", other)),
        }
    }
}

/// How artifacts group into bundles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupingShape {
    /// One bundle per (year, month). Any cycle reported by discovery is ignored.
    Period,
    /// One bundle per (year, month, cycle). Discovery must report a cycle.
    PeriodAndCycle,
}

/// Named policy presets, as selected in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    Pair,
    Single,
    Cycled,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pair" => Ok(Self::Pair),
            "single" => Ok(Self::Single),
            "cycled" => Ok(Self::Cycled),
            other => Err(format!("unknown policy '{}'", other)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Pair => "pair",
            PolicyKind::Single => "single",
            PolicyKind::Cycled => "cycled",
        };
        f.write_str(name)
    }
}

/// Why a discovered descriptor cannot be turned into a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("artifact name is empty")]
    EmptyName,

    #[error("month {month} out of range for '{name}'")]
    InvalidMonth { name: String, month: u32 },

    #[error("'{name}' has no cycle but the vendor groups by cycle")]
    MissingCycle { name: String },

    #[error("'{name}' has no remote id but the vendor keys by remote id")]
    MissingRemoteId { name: String },

    #[error("{field} '{value}' is not a plain file name component")]
    UnsafePathComponent { field: &'static str, value: String },
}

/// Reject values that would leave their directory once rendered into a path.
fn check_path_component(field: &'static str, value: &str) -> Result<(), CandidateError> {
    let unsafe_value = value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if unsafe_value {
        return Err(CandidateError::UnsafePathComponent {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Policy
// =============================================================================

/// Everything vendor-specific about the acquisition pipeline.
#[derive(Clone, Debug)]
pub struct AcquisitionPolicy {
    /// Vendor name, used in logs and registry file names.
    pub vendor: String,

    pub key_shape: NaturalKeyShape,

    pub grouping: GroupingShape,

    /// Readiness rules, matched by bundle cycle.
    pub rules: Vec<ReadinessRule>,

    /// Location of an artifact below the vendor storage root.
    pub path_template: PathTemplate,

    /// Suffix of the in-flight marker next to the target file.
    pub sentinel_suffix: String,

    /// Completion-sentinel poll interval.
    pub poll_interval: Duration,

    /// Maximum time a single acquisition may take before it is abandoned
    /// for this pass.
    pub acquire_timeout: Duration,
}

impl AcquisitionPolicy {
    fn base(
        vendor: impl Into<String>,
        grouping: GroupingShape,
        template: &str,
        rules: Vec<ReadinessRule>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            key_shape: NaturalKeyShape::NamePeriod,
            grouping,
            rules,
            path_template: PathTemplate::builtin(template),
            sentinel_suffix: DEFAULT_SENTINEL_SUFFIX.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Small fixed release: at least two members, all on disk.
    pub fn pair(vendor: impl Into<String>) -> Self {
        Self::base(
            vendor,
            GroupingShape::Period,
            DEFAULT_PATH_TEMPLATE,
            vec![ReadinessRule::threshold(PAIR_MIN_MEMBERS)],
        )
    }

    /// Single-artifact release keyed by the vendor's remote identifier.
    pub fn single(vendor: impl Into<String>) -> Self {
        Self::base(
            vendor,
            GroupingShape::Period,
            DEFAULT_PATH_TEMPLATE,
            vec![ReadinessRule::threshold(SINGLE_MIN_MEMBERS)],
        )
        .with_key_shape(NaturalKeyShape::RemoteId)
    }

    /// Release split into a primary and a dependent variant.
    ///
    /// The dependent variant only becomes ready once the primary variant of
    /// the same period contains `shared_artifact`.
    pub fn cycled(vendor: impl Into<String>, shared_artifact: impl Into<String>) -> Self {
        Self::base(
            vendor,
            GroupingShape::PeriodAndCycle,
            DEFAULT_CYCLED_PATH_TEMPLATE,
            vec![
                ReadinessRule::threshold(CYCLE_PRIMARY_MIN_MEMBERS).for_cycle(CYCLE_PRIMARY),
                ReadinessRule::threshold(CYCLE_DEPENDENT_MIN_MEMBERS)
                    .for_cycle(CYCLE_DEPENDENT)
                    .with_dependency(CrossBundleDependency::new(CYCLE_PRIMARY, shared_artifact)),
            ],
        )
    }

    /// Build a preset by kind. `shared_artifact` is only used by
    /// [`PolicyKind::Cycled`].
    pub fn preset(kind: PolicyKind, vendor: impl Into<String>, shared_artifact: &str) -> Self {
        match kind {
            PolicyKind::Pair => Self::pair(vendor),
            PolicyKind::Single => Self::single(vendor),
            PolicyKind::Cycled => Self::cycled(vendor, shared_artifact),
        }
    }

    pub fn with_key_shape(mut self, shape: NaturalKeyShape) -> Self {
        self.key_shape = shape;
        self
    }

    pub fn with_path_template(mut self, template: PathTemplate) -> Self {
        self.path_template = template;
        self
    }

    pub fn with_sentinel_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.sentinel_suffix = suffix.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Replace the threshold of every rule without a cross-bundle dependency.
    pub fn with_min_members(mut self, min_members: usize) -> Self {
        for rule in self.rules.iter_mut().filter(|r| r.dependency.is_none()) {
            rule.min_members = min_members;
        }
        self
    }

    /// The rule governing a bundle, if any.
    ///
    /// A rule without a cycle applies to every bundle not matched by a
    /// cycle-specific rule.
    pub fn rule_for(&self, key: &GroupingKey) -> Option<&ReadinessRule> {
        self.rules
            .iter()
            .find(|r| r.cycle.is_some() && r.cycle == key.cycle)
            .or_else(|| self.rules.iter().find(|r| r.cycle.is_none()))
    }

    /// Normalise the grouping key of a descriptor.
    ///
    /// Cycles are upper-cased so `n` and `N` name the same bundle.
    pub fn grouping_key(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<GroupingKey, CandidateError> {
        if !(1..=12).contains(&descriptor.group_month) {
            return Err(CandidateError::InvalidMonth {
                name: descriptor.name.clone(),
                month: descriptor.group_month,
            });
        }

        match self.grouping {
            GroupingShape::Period => Ok(GroupingKey::period(
                descriptor.group_year,
                descriptor.group_month,
            )),
            GroupingShape::PeriodAndCycle => {
                let cycle = descriptor
                    .group_cycle
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| CandidateError::MissingCycle {
                        name: descriptor.name.clone(),
                    })?;
                check_path_component("cycle", cycle)?;
                Ok(GroupingKey::with_cycle(
                    descriptor.group_year,
                    descriptor.group_month,
                    cycle.to_ascii_uppercase(),
                ))
            }
        }
    }

    /// Render the natural key of a descriptor.
    pub fn natural_key(
        &self,
        descriptor: &ArtifactDescriptor,
        grouping: &GroupingKey,
    ) -> Result<NaturalKey, CandidateError> {
        match self.key_shape {
            NaturalKeyShape::NamePeriod => {
                let mut key = format!(
                    "{}|{:04}-{:02}",
                    descriptor.name, grouping.year, grouping.month
                );
                if let Some(cycle) = &grouping.cycle {
                    key.push('|');
                    key.push_str(cycle);
                }
                Ok(NaturalKey::new(key))
            }
            NaturalKeyShape::RemoteId => descriptor
                .remote_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| NaturalKey::new(format!("id:{}", id)))
                .ok_or_else(|| CandidateError::MissingRemoteId {
                    name: descriptor.name.clone(),
                }),
        }
    }

    /// Validate a descriptor and derive both of its keys.
    pub fn keys_for(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<(NaturalKey, GroupingKey), CandidateError> {
        if descriptor.name.trim().is_empty() {
            return Err(CandidateError::EmptyName);
        }
        check_path_component("name", &descriptor.name)?;
        let grouping = self.grouping_key(descriptor)?;
        let key = self.natural_key(descriptor, &grouping)?;
        Ok((key, grouping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_preset() {
        let policy = AcquisitionPolicy::pair("alpha");
        assert_eq!(policy.grouping, GroupingShape::Period);
        assert_eq!(policy.key_shape, NaturalKeyShape::NamePeriod);

        let rule = policy.rule_for(&GroupingKey::period(2024, 3)).unwrap();
        assert_eq!(rule.min_members, 2);
        assert!(rule.dependency.is_none());
    }

    #[test]
    fn test_single_preset_keys_by_remote_id() {
        let policy = AcquisitionPolicy::single("beta");
        assert_eq!(policy.key_shape, NaturalKeyShape::RemoteId);
        assert_eq!(
            policy
                .rule_for(&GroupingKey::period(2024, 3))
                .unwrap()
                .min_members,
            1
        );
    }

    #[test]
    fn test_cycled_preset_rules() {
        let policy = AcquisitionPolicy::cycled("gamma", "shared.dat");

        let primary = policy
            .rule_for(&GroupingKey::with_cycle(2024, 3, "N"))
            .unwrap();
        assert_eq!(primary.min_members, 6);
        assert!(primary.dependency.is_none());

        let dependent = policy
            .rule_for(&GroupingKey::with_cycle(2024, 3, "O"))
            .unwrap();
        assert_eq!(dependent.min_members, 4);
        let dep = dependent.dependency.as_ref().unwrap();
        assert_eq!(dep.sibling_cycle, "N");
        assert_eq!(dep.shared_artifact, "shared.dat");

        assert!(policy
            .rule_for(&GroupingKey::with_cycle(2024, 3, "X"))
            .is_none());
    }

    #[test]
    fn test_name_period_key_includes_cycle() {
        let policy = AcquisitionPolicy::cycled("gamma", "shared.dat");
        let descriptor = ArtifactDescriptor::new("a.dat", 2024, 3).with_cycle("O");

        let (key, grouping) = policy.keys_for(&descriptor).unwrap();
        assert_eq!(key.as_str(), "a.dat|2024-03|O");
        assert_eq!(grouping, GroupingKey::with_cycle(2024, 3, "O"));
    }

    #[test]
    fn test_period_grouping_drops_reported_cycle() {
        let policy = AcquisitionPolicy::pair("alpha");
        let descriptor = ArtifactDescriptor::new("a.dat", 2024, 3).with_cycle("N");

        let (key, grouping) = policy.keys_for(&descriptor).unwrap();
        assert_eq!(key.as_str(), "a.dat|2024-03");
        assert_eq!(grouping, GroupingKey::period(2024, 3));
    }

    #[test]
    fn test_remote_id_key() {
        let policy = AcquisitionPolicy::single("beta");
        let descriptor = ArtifactDescriptor::new("release.zip", 2024, 3).with_remote_id(" 8812 ");

        let (key, _) = policy.keys_for(&descriptor).unwrap();
        assert_eq!(key.as_str(), "id:8812");
    }

    #[test]
    fn test_candidate_errors() {
        let single = AcquisitionPolicy::single("beta");
        assert_eq!(
            single.keys_for(&ArtifactDescriptor::new("r.zip", 2024, 3)),
            Err(CandidateError::MissingRemoteId {
                name: "r.zip".to_string()
            })
        );

        let cycled = AcquisitionPolicy::cycled("gamma", "s");
        assert!(matches!(
            cycled.keys_for(&ArtifactDescriptor::new("a", 2024, 3)),
            Err(CandidateError::MissingCycle { .. })
        ));

        let pair = AcquisitionPolicy::pair("alpha");
        assert!(matches!(
            pair.keys_for(&ArtifactDescriptor::new("a", 2024, 13)),
            Err(CandidateError::InvalidMonth { month: 13, .. })
        ));
        assert_eq!(
            pair.keys_for(&ArtifactDescriptor::new("  ", 2024, 3)),
            Err(CandidateError::EmptyName)
        );
    }

    #[test]
    fn test_names_that_escape_the_storage_root_are_rejected() {
        let pair = AcquisitionPolicy::pair("alpha");
        for name in ["../../../escaped.zip", "sub/a.zip", "/etc/passwd", "a\\b.zip", ".."] {
            assert!(
                matches!(
                    pair.keys_for(&ArtifactDescriptor::new(name, 2024, 3)),
                    Err(CandidateError::UnsafePathComponent { field: "name", .. })
                ),
                "{} was accepted",
                name
            );
        }
        assert!(pair
            .keys_for(&ArtifactDescriptor::new("a..b.zip", 2024, 3))
            .is_ok());

        let cycled = AcquisitionPolicy::cycled("gamma", "s");
        assert!(matches!(
            cycled.keys_for(&ArtifactDescriptor::new("a.dat", 2024, 3).with_cycle("../N")),
            Err(CandidateError::UnsafePathComponent { field: "cycle", .. })
        ));
    }

    #[test]
    fn test_lowercase_cycle_matches_rule() {
        let policy = AcquisitionPolicy::cycled("gamma", "shared.dat");
        let descriptor = ArtifactDescriptor::new("a.dat", 2024, 3).with_cycle(" o ");

        let (key, grouping) = policy.keys_for(&descriptor).unwrap();
        assert_eq!(grouping, GroupingKey::with_cycle(2024, 3, "O"));
        assert_eq!(key.as_str(), "a.dat|2024-03|O");
        assert_eq!(policy.rule_for(&grouping).unwrap().min_members, 4);
    }

    #[test]
    fn test_min_members_override_skips_dependent_rule() {
        let policy = AcquisitionPolicy::cycled("gamma", "s").with_min_members(3);
        let n = policy.rule_for(&GroupingKey::with_cycle(2024, 3, "N")).unwrap();
        let o = policy.rule_for(&GroupingKey::with_cycle(2024, 3, "O")).unwrap();
        assert_eq!(n.min_members, 3);
        assert_eq!(o.min_members, 4);
    }

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("Pair".parse::<PolicyKind>(), Ok(PolicyKind::Pair));
        assert_eq!("cycled".parse::<PolicyKind>(), Ok(PolicyKind::Cycled));
        assert!("weekly".parse::<PolicyKind>().is_err());
        assert_eq!(
            "remote-id".parse::<NaturalKeyShape>(),
            Ok(NaturalKeyShape::RemoteId)
        );
    }
}
