//! Local storage conventions and the disk presence check.
//!
//! Each vendor stores artifacts below its own root using a [`PathTemplate`].
//! Transports write to a marker file (`<target><suffix>`) and rename it onto
//! the target when done, so the presence of the marker means "in flight":
//!
//! ```text
//! <root>/2024/03/chart.zip.part   ──rename──►   <root>/2024/03/chart.zip
//!        (InFlight)                                  (Complete)
//! ```

mod sentinel;
mod template;

use std::path::{Path, PathBuf};

use crate::model::{ArtifactRecord, GroupingKey};
use crate::policy::AcquisitionPolicy;

pub use sentinel::{marker_path, probe, SentinelState};
pub use template::{PathTemplate, TemplateError};

/// Side-effect free check of whether an artifact already exists locally.
#[derive(Debug, Clone)]
pub struct DiskPresenceChecker {
    root: PathBuf,
    template: PathTemplate,
    sentinel_suffix: String,
}

impl DiskPresenceChecker {
    pub fn new(
        root: impl Into<PathBuf>,
        template: PathTemplate,
        sentinel_suffix: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            template,
            sentinel_suffix: sentinel_suffix.into(),
        }
    }

    /// Checker using the policy's path template and sentinel suffix.
    pub fn for_policy(root: impl Into<PathBuf>, policy: &AcquisitionPolicy) -> Self {
        Self::new(
            root,
            policy.path_template.clone(),
            policy.sentinel_suffix.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sentinel_suffix(&self) -> &str {
        &self.sentinel_suffix
    }

    /// Expected location of an artifact.
    pub fn target_path(&self, name: &str, grouping: &GroupingKey) -> PathBuf {
        self.root.join(self.template.render(name, grouping))
    }

    /// Expected location of a recorded artifact.
    pub fn record_target(&self, record: &ArtifactRecord) -> PathBuf {
        self.target_path(&record.name, &record.grouping_key())
    }

    /// Sentinel state at a target path.
    pub fn probe(&self, target: &Path) -> SentinelState {
        probe(target, &self.sentinel_suffix)
    }

    /// Whether the artifact is fully present: the target file exists and no
    /// partial-file marker sits next to it.
    pub fn is_present(&self, name: &str, grouping: &GroupingKey) -> bool {
        self.probe(&self.target_path(name, grouping)) == SentinelState::Complete
    }
}
