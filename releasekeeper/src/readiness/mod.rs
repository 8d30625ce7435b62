//! Bundle readiness under a vendor's completeness policy.
//!
//! Evaluation reads one registry snapshot and decides every bundle against
//! it; only afterwards are the transitions committed, one bundle per commit.
//! A bundle that is already ready is never touched again.
//!
//! ```text
//! not ready ──(rule satisfied)──► ready      ready_at, member_count_at_ready
//!     ▲  │                                    captured once
//!     └──┘ waiting (below threshold, members pending, sibling missing)
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::model::{Bundle, GroupingKey};
use crate::policy::{AcquisitionPolicy, CrossBundleDependency, ReadinessRule};
use crate::registry::{Mutation, Registry, RegistryResult, RegistryState};

/// Why a bundle is not ready yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Waiting {
    /// No readiness rule covers this bundle's cycle.
    NoRule,
    /// Fewer members than the rule requires.
    BelowThreshold { members: usize, required: usize },
    /// Some members are not on disk yet.
    MembersPending { pending: usize },
    /// The sibling bundle the rule depends on does not exist yet.
    MissingSibling { sibling: GroupingKey },
    /// The sibling bundle exists but lacks the shared artifact.
    SharedArtifactMissing { sibling: GroupingKey, artifact: String },
}

impl fmt::Display for Waiting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waiting::NoRule => write!(f, "no readiness rule"),
            Waiting::BelowThreshold { members, required } => {
                write!(f, "{} of {} members", members, required)
            }
            Waiting::MembersPending { pending } => write!(f, "{} members not on disk", pending),
            Waiting::MissingSibling { sibling } => write!(f, "sibling {} not seen yet", sibling),
            Waiting::SharedArtifactMissing { sibling, artifact } => {
                write!(f, "sibling {} lacks {}", sibling, artifact)
            }
        }
    }
}

/// Decision for one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    AlreadyReady,
    Ready,
    Waiting(Waiting),
}

/// Result of one readiness run.
#[derive(Debug, Default, Clone)]
pub struct ReadinessReport {
    /// Bundles that became ready in this run.
    pub newly_ready: Vec<GroupingKey>,
    /// Bundles that were ready before this run.
    pub already_ready: usize,
    /// Bundles still waiting, with the reason.
    pub waiting: Vec<(GroupingKey, Waiting)>,
}

/// Applies the vendor's readiness rules to its bundles.
pub struct ReadinessEvaluator {
    policy: AcquisitionPolicy,
    registry: Arc<dyn Registry>,
}

impl ReadinessEvaluator {
    pub fn new(policy: AcquisitionPolicy, registry: Arc<dyn Registry>) -> Self {
        Self { policy, registry }
    }

    /// Decide every bundle against one snapshot, without writing.
    pub fn evaluate(&self, state: &RegistryState) -> Vec<(GroupingKey, Verdict)> {
        state
            .bundles()
            .map(|bundle| (bundle.key(), self.verdict(state, bundle)))
            .collect()
    }

    /// Evaluate and commit every new transition.
    pub fn run(&self) -> RegistryResult<ReadinessReport> {
        let state = self.registry.snapshot()?;
        let mut report = ReadinessReport::default();

        for (key, verdict) in self.evaluate(&state) {
            match verdict {
                Verdict::AlreadyReady => report.already_ready += 1,
                Verdict::Waiting(reason) => report.waiting.push((key, reason)),
                Verdict::Ready => {
                    let Some(bundle) = state.bundle(&key) else {
                        continue;
                    };
                    let ready = bundle.marked_ready(Utc::now());
                    self.registry.commit(vec![Mutation::PutBundle(ready)])?;
                    info!(
                        vendor = %self.policy.vendor,
                        bundle = %key,
                        members = bundle.member_count(),
                        "Bundle ready"
                    );
                    report.newly_ready.push(key);
                }
            }
        }

        Ok(report)
    }

    fn verdict(&self, state: &RegistryState, bundle: &Bundle) -> Verdict {
        if bundle.ready {
            return Verdict::AlreadyReady;
        }
        let key = bundle.key();
        let Some(rule) = self.policy.rule_for(&key) else {
            warn!(
                vendor = %self.policy.vendor,
                bundle = %key,
                "No readiness rule covers this bundle, it will never become ready"
            );
            return Verdict::Waiting(Waiting::NoRule);
        };

        match check_rule(state, bundle, rule) {
            Some(waiting) => Verdict::Waiting(waiting),
            None => match &rule.dependency {
                Some(dep) => match self.check_dependency(state, &key, dep) {
                    Some(waiting) => Verdict::Waiting(waiting),
                    None => Verdict::Ready,
                },
                None => Verdict::Ready,
            },
        }
    }

    fn check_dependency(
        &self,
        state: &RegistryState,
        key: &GroupingKey,
        dep: &CrossBundleDependency,
    ) -> Option<Waiting> {
        let sibling_key = key.sibling(&dep.sibling_cycle);
        let Some(sibling) = state.bundle(&sibling_key) else {
            debug!(
                vendor = %self.policy.vendor,
                bundle = %key,
                sibling = %sibling_key,
                "Sibling bundle not seen yet"
            );
            return Some(Waiting::MissingSibling {
                sibling: sibling_key,
            });
        };

        let has_shared = sibling
            .members
            .iter()
            .filter_map(|member| state.artifact(member))
            .any(|record| dep.matches(&record.name));
        if has_shared {
            None
        } else {
            Some(Waiting::SharedArtifactMissing {
                sibling: sibling_key,
                artifact: dep.shared_artifact.clone(),
            })
        }
    }
}

/// Threshold and completeness check, `None` when both hold.
fn check_rule(state: &RegistryState, bundle: &Bundle, rule: &ReadinessRule) -> Option<Waiting> {
    let members = bundle.member_count();
    if members < rule.min_members {
        return Some(Waiting::BelowThreshold {
            members,
            required: rule.min_members,
        });
    }

    let pending = bundle
        .members
        .iter()
        .filter(|member| !state.artifact(member).is_some_and(|r| r.on_disk))
        .count();
    if pending > 0 {
        return Some(Waiting::MembersPending { pending });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactDescriptor, ArtifactRecord, NaturalKey};
    use crate::reconcile::with_member;
    use crate::registry::MemoryRegistry;

    fn add(
        registry: &MemoryRegistry,
        policy: &AcquisitionPolicy,
        descriptor: ArtifactDescriptor,
        on_disk: bool,
    ) -> NaturalKey {
        let (key, grouping) = policy.keys_for(&descriptor).unwrap();
        let record =
            ArtifactRecord::first_sighting(key.clone(), &descriptor, &grouping, on_disk, Utc::now());
        let bundle = with_member(registry.bundle(&grouping).unwrap(), &record, Utc::now());
        registry
            .commit(vec![
                Mutation::InsertArtifact(record),
                Mutation::PutBundle(bundle),
            ])
            .unwrap();
        key
    }

    fn mark_on_disk(registry: &MemoryRegistry, key: &NaturalKey) {
        let record = registry.artifact(key).unwrap().unwrap();
        registry
            .commit(vec![Mutation::UpdateArtifact(record.marked_on_disk(Utc::now()))])
            .unwrap();
    }

    #[test]
    fn test_single_ready_once_on_disk() {
        let policy = AcquisitionPolicy::single("beta");
        let registry = Arc::new(MemoryRegistry::new());
        let key = add(
            &registry,
            &policy,
            ArtifactDescriptor::new("a.zip", 2024, 3).with_remote_id("7"),
            false,
        );
        let evaluator = ReadinessEvaluator::new(policy, registry.clone());

        let report = evaluator.run().unwrap();
        assert!(report.newly_ready.is_empty());
        assert_eq!(report.waiting[0].1, Waiting::MembersPending { pending: 1 });

        mark_on_disk(&registry, &key);
        let report = evaluator.run().unwrap();
        assert_eq!(report.newly_ready, vec![GroupingKey::period(2024, 3)]);

        let bundle = registry.bundle(&GroupingKey::period(2024, 3)).unwrap().unwrap();
        assert!(bundle.ready);
        assert_eq!(bundle.member_count_at_ready, Some(1));
    }

    #[test]
    fn test_pair_waits_for_second_member() {
        let policy = AcquisitionPolicy::pair("alpha");
        let registry = Arc::new(MemoryRegistry::new());
        add(&registry, &policy, ArtifactDescriptor::new("a.zip", 2024, 3), true);
        let evaluator = ReadinessEvaluator::new(policy.clone(), registry.clone());

        let report = evaluator.run().unwrap();
        assert_eq!(
            report.waiting[0].1,
            Waiting::BelowThreshold {
                members: 1,
                required: 2
            }
        );

        add(&registry, &policy, ArtifactDescriptor::new("b.zip", 2024, 3), true);
        let report = evaluator.run().unwrap();
        assert_eq!(report.newly_ready.len(), 1);
    }

    #[test]
    fn test_ready_snapshot_not_rewritten() {
        let policy = AcquisitionPolicy::pair("alpha");
        let registry = Arc::new(MemoryRegistry::new());
        add(&registry, &policy, ArtifactDescriptor::new("a.zip", 2024, 3), true);
        add(&registry, &policy, ArtifactDescriptor::new("b.zip", 2024, 3), true);
        let evaluator = ReadinessEvaluator::new(policy.clone(), registry.clone());
        evaluator.run().unwrap();
        let first = registry.bundle(&GroupingKey::period(2024, 3)).unwrap().unwrap();

        add(&registry, &policy, ArtifactDescriptor::new("c.zip", 2024, 3), false);
        let report = evaluator.run().unwrap();

        assert!(report.newly_ready.is_empty());
        assert_eq!(report.already_ready, 1);
        let again = registry.bundle(&GroupingKey::period(2024, 3)).unwrap().unwrap();
        assert_eq!(again.ready_at, first.ready_at);
        assert_eq!(again.member_count_at_ready, Some(2));
        assert_eq!(again.member_count(), 3);
    }

    fn cycled(registry: &MemoryRegistry, policy: &AcquisitionPolicy, cycle: &str, names: &[&str]) {
        for name in names {
            add(
                registry,
                policy,
                ArtifactDescriptor::new(*name, 2024, 3).with_cycle(cycle),
                true,
            );
        }
    }

    #[test]
    fn test_dependent_cycle_needs_shared_artifact_in_sibling() {
        let policy = AcquisitionPolicy::cycled("gamma", "Shared.dat");
        let registry = Arc::new(MemoryRegistry::new());
        cycled(&registry, &policy, "O", &["o1", "o2", "o3", "o4"]);
        let evaluator = ReadinessEvaluator::new(policy.clone(), registry.clone());
        let dependent = GroupingKey::with_cycle(2024, 3, "O");

        let verdicts = evaluator.evaluate(&registry.snapshot().unwrap());
        assert_eq!(
            verdicts,
            vec![(
                dependent.clone(),
                Verdict::Waiting(Waiting::MissingSibling {
                    sibling: GroupingKey::with_cycle(2024, 3, "N")
                })
            )]
        );

        cycled(&registry, &policy, "N", &["n1"]);
        let report = evaluator.run().unwrap();
        assert!(report.newly_ready.is_empty());
        assert!(report.waiting.iter().any(|(key, reason)| key == &dependent
            && matches!(reason, Waiting::SharedArtifactMissing { .. })));

        cycled(&registry, &policy, "N", &["shared.DAT"]);
        let report = evaluator.run().unwrap();
        assert_eq!(report.newly_ready, vec![dependent]);
    }

    #[test]
    fn test_primary_cycle_needs_six_members() {
        let policy = AcquisitionPolicy::cycled("gamma", "shared.dat");
        let registry = Arc::new(MemoryRegistry::new());
        cycled(&registry, &policy, "N", &["n1", "n2", "n3", "n4", "n5"]);
        let evaluator = ReadinessEvaluator::new(policy.clone(), registry.clone());

        assert!(evaluator.run().unwrap().newly_ready.is_empty());

        cycled(&registry, &policy, "N", &["n6"]);
        assert_eq!(
            evaluator.run().unwrap().newly_ready,
            vec![GroupingKey::with_cycle(2024, 3, "N")]
        );
    }

    #[test]
    fn test_unknown_cycle_never_ready() {
        let policy = AcquisitionPolicy::cycled("gamma", "shared.dat");
        let registry = Arc::new(MemoryRegistry::new());
        cycled(&registry, &policy, "X", &["x1", "x2", "x3", "x4", "x5", "x6", "x7"]);
        let evaluator = ReadinessEvaluator::new(policy, registry);

        let report = evaluator.run().unwrap();
        assert!(report.newly_ready.is_empty());
        assert_eq!(report.waiting[0].1, Waiting::NoRule);
    }

    #[test]
    fn test_lowercase_cycle_from_discovery_is_governed() {
        let policy = AcquisitionPolicy::cycled("gamma", "shared.dat");
        let registry = Arc::new(MemoryRegistry::new());
        cycled(&registry, &policy, "n", &["n1", "n2", "n3", "n4", "n5", "n6"]);
        let evaluator = ReadinessEvaluator::new(policy, registry);

        assert_eq!(
            evaluator.run().unwrap().newly_ready,
            vec![GroupingKey::with_cycle(2024, 3, "N")]
        );
    }
}
