//! Readiness rules.

/// Completeness rule for bundles of one cycle (or of every cycle).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadinessRule {
    /// Cycle this rule applies to; `None` matches any bundle without a more
    /// specific rule.
    pub cycle: Option<String>,

    /// Minimum number of members, all of which must be on disk.
    pub min_members: usize,

    /// Extra condition on a sibling bundle of the same period.
    pub dependency: Option<CrossBundleDependency>,
}

impl ReadinessRule {
    pub fn threshold(min_members: usize) -> Self {
        Self {
            cycle: None,
            min_members,
            dependency: None,
        }
    }

    pub fn for_cycle(mut self, cycle: impl Into<String>) -> Self {
        self.cycle = Some(cycle.into());
        self
    }

    pub fn with_dependency(mut self, dependency: CrossBundleDependency) -> Self {
        self.dependency = Some(dependency);
        self
    }
}

/// Requires the sibling bundle (same year and month, `sibling_cycle`) to
/// contain at least one artifact named `shared_artifact`.
///
/// Names compare case-insensitively. A missing sibling bundle leaves the
/// dependent bundle not ready; it is not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossBundleDependency {
    pub sibling_cycle: String,
    pub shared_artifact: String,
}

impl CrossBundleDependency {
    pub fn new(sibling_cycle: impl Into<String>, shared_artifact: impl Into<String>) -> Self {
        Self {
            sibling_cycle: sibling_cycle.into(),
            shared_artifact: shared_artifact.into(),
        }
    }

    /// Whether an artifact name satisfies this dependency.
    pub fn matches(&self, artifact_name: &str) -> bool {
        artifact_name.eq_ignore_ascii_case(&self.shared_artifact)
    }
}
