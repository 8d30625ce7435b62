//! Reconciliation of discovered candidates against the registry.
//!
//! # Architecture
//!
//! ```text
//! Vec<ArtifactDescriptor>
//!         │
//!         ▼
//! Reconciler::validate         policy keys + grouping, all-or-nothing
//!         │
//!         ▼
//! Reconciler::apply            per candidate:
//!         │                      known key?        → skip
//!         │                      DiskPresenceChecker → on_disk
//!         │                      BundleAggregator  → bundle + member
//!         ▼                      commit [record, bundle]
//! ReconcileReport
//! ```
//!
//! Every candidate is one registry commit, so an interrupted pass leaves a
//! prefix of the candidates fully registered and the rest untouched.

mod aggregator;

pub use aggregator::{with_member, BundleAggregator};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::discovery::AdapterError;
use crate::model::{ArtifactDescriptor, ArtifactRecord, GroupingKey, NaturalKey};
use crate::policy::AcquisitionPolicy;
use crate::presence::DiskPresenceChecker;
use crate::registry::{Mutation, Registry, RegistryResult};

/// A descriptor whose keys have been derived under the vendor policy.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: NaturalKey,
    pub grouping: GroupingKey,
    pub descriptor: ArtifactDescriptor,
}

/// What one reconciliation did.
#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    /// Newly registered artifacts, in discovery order.
    pub inserted: Vec<NaturalKey>,
    /// New artifacts that were already on disk at first sighting.
    pub already_on_disk: usize,
    /// Candidates already present in the registry.
    pub known: usize,
    /// Repeats of a key earlier in the same discovery result.
    pub duplicates: usize,
    /// Bundles created during this reconciliation.
    pub bundles_created: usize,
    /// Whether reconciliation stopped early because of cancellation.
    pub cancelled: bool,
}

/// Deduplicates candidates and registers the new ones.
pub struct Reconciler {
    policy: AcquisitionPolicy,
    registry: Arc<dyn Registry>,
    checker: DiskPresenceChecker,
    aggregator: BundleAggregator,
}

impl Reconciler {
    pub fn new(
        policy: AcquisitionPolicy,
        registry: Arc<dyn Registry>,
        checker: DiskPresenceChecker,
    ) -> Self {
        Self {
            aggregator: BundleAggregator::new(registry.clone()),
            policy,
            registry,
            checker,
        }
    }

    /// Derive keys for every descriptor.
    ///
    /// The first malformed descriptor fails the whole batch, so nothing is
    /// written for a discovery result that contains one.
    pub fn validate(
        &self,
        descriptors: Vec<ArtifactDescriptor>,
    ) -> Result<Vec<Candidate>, AdapterError> {
        descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let (key, grouping) = self
                    .policy
                    .keys_for(&descriptor)
                    .map_err(|source| AdapterError::InvalidCandidate { index, source })?;
                Ok(Candidate {
                    key,
                    grouping,
                    descriptor,
                })
            })
            .collect()
    }

    /// Register every candidate not yet known.
    ///
    /// Cancellation is checked between candidates; a registry failure stops
    /// reconciliation with the already-committed candidates in place.
    pub fn apply(
        &self,
        candidates: Vec<Candidate>,
        cancel: &CancellationToken,
    ) -> RegistryResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::new();

        for candidate in candidates {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !seen.insert(candidate.key.clone()) {
                report.duplicates += 1;
                continue;
            }
            if self.registry.artifact(&candidate.key)?.is_some() {
                report.known += 1;
                continue;
            }

            let record = self.register(&candidate, &mut report)?;
            debug!(
                vendor = %self.policy.vendor,
                key = %record.natural_key,
                bundle = %candidate.grouping,
                on_disk = record.on_disk,
                "Registered new artifact"
            );
        }

        info!(
            vendor = %self.policy.vendor,
            inserted = report.inserted.len(),
            already_on_disk = report.already_on_disk,
            known = report.known,
            duplicates = report.duplicates,
            bundles_created = report.bundles_created,
            "Reconciliation finished"
        );
        Ok(report)
    }

    fn register(
        &self,
        candidate: &Candidate,
        report: &mut ReconcileReport,
    ) -> RegistryResult<ArtifactRecord> {
        let now = Utc::now();
        let on_disk = self
            .checker
            .is_present(&candidate.descriptor.name, &candidate.grouping);
        let record = ArtifactRecord::first_sighting(
            candidate.key.clone(),
            &candidate.descriptor,
            &candidate.grouping,
            on_disk,
            now,
        );
        let (bundle, created) = self.aggregator.attach(&record, now)?;

        self.registry.commit(vec![
            Mutation::InsertArtifact(record.clone()),
            Mutation::PutBundle(bundle),
        ])?;

        report.inserted.push(record.natural_key.clone());
        if on_disk {
            report.already_on_disk += 1;
        }
        if created {
            report.bundles_created += 1;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CandidateError;
    use crate::presence::PathTemplate;
    use crate::registry::MemoryRegistry;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        registry: Arc<MemoryRegistry>,
        reconciler: Reconciler,
    }

    fn fixture(policy: AcquisitionPolicy) -> Fixture {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let checker = DiskPresenceChecker::new(
            temp.path(),
            PathTemplate::parse("{year}/{month}/{name}").unwrap(),
            ".part",
        );
        let reconciler = Reconciler::new(policy, registry.clone(), checker);
        Fixture {
            temp,
            registry,
            reconciler,
        }
    }

    fn reconcile(fx: &Fixture, descriptors: Vec<ArtifactDescriptor>) -> ReconcileReport {
        let candidates = fx.reconciler.validate(descriptors).unwrap();
        fx.reconciler
            .apply(candidates, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_new_candidates_are_registered_with_bundle() {
        let fx = fixture(AcquisitionPolicy::pair("alpha"));

        let report = reconcile(
            &fx,
            vec![
                ArtifactDescriptor::new("a.zip", 2024, 3),
                ArtifactDescriptor::new("b.zip", 2024, 3),
            ],
        );

        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.bundles_created, 1);
        let state = fx.registry.snapshot().unwrap();
        assert_eq!(state.artifact_count(), 2);
        let bundle = state.bundle(&GroupingKey::period(2024, 3)).unwrap();
        assert_eq!(bundle.member_count(), 2);
        assert!(!bundle.ready);
    }

    #[test]
    fn test_repeated_pass_is_a_no_op() {
        let fx = fixture(AcquisitionPolicy::pair("alpha"));
        let descriptors = vec![ArtifactDescriptor::new("a.zip", 2024, 3)];

        reconcile(&fx, descriptors.clone());
        let before = fx.registry.snapshot().unwrap();
        let report = reconcile(&fx, descriptors);

        assert!(report.inserted.is_empty());
        assert_eq!(report.known, 1);
        assert_eq!(fx.registry.snapshot().unwrap(), before);
    }

    #[test]
    fn test_duplicates_within_one_result() {
        let fx = fixture(AcquisitionPolicy::pair("alpha"));

        let report = reconcile(
            &fx,
            vec![
                ArtifactDescriptor::new("a.zip", 2024, 3),
                ArtifactDescriptor::new("a.zip", 2024, 3),
            ],
        );

        assert_eq!(report.inserted.len(), 1);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_present_artifact_registered_on_disk() {
        let fx = fixture(AcquisitionPolicy::pair("alpha"));
        let dir = fx.temp.path().join("2024/03");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.zip"), b"data").unwrap();
        std::fs::write(dir.join("b.zip"), b"half").unwrap();
        std::fs::write(dir.join("b.zip.part"), b"").unwrap();

        let report = reconcile(
            &fx,
            vec![
                ArtifactDescriptor::new("a.zip", 2024, 3),
                ArtifactDescriptor::new("b.zip", 2024, 3),
            ],
        );

        assert_eq!(report.already_on_disk, 1);
        let state = fx.registry.snapshot().unwrap();
        let a = state.artifact(&NaturalKey::new("a.zip|2024-03")).unwrap();
        assert!(a.on_disk);
        assert_eq!(a.downloaded_at, Some(a.first_seen_at));
        let b = state.artifact(&NaturalKey::new("b.zip|2024-03")).unwrap();
        assert!(!b.on_disk);
    }

    #[test]
    fn test_invalid_candidate_rejects_whole_batch() {
        let fx = fixture(AcquisitionPolicy::single("beta"));

        let err = fx
            .reconciler
            .validate(vec![
                ArtifactDescriptor::new("a.zip", 2024, 3).with_remote_id("1"),
                ArtifactDescriptor::new("b.zip", 2024, 3),
            ])
            .unwrap_err();

        match err {
            AdapterError::InvalidCandidate { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(source, CandidateError::MissingRemoteId { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fx.registry.snapshot().unwrap().artifact_count(), 0);
    }

    #[test]
    fn test_name_escaping_storage_root_rejects_batch() {
        let fx = fixture(AcquisitionPolicy::pair("alpha"));

        let err = fx
            .reconciler
            .validate(vec![
                ArtifactDescriptor::new("a.zip", 2024, 3),
                ArtifactDescriptor::new("../../../escaped.zip", 2024, 3),
            ])
            .unwrap_err();

        match err {
            AdapterError::InvalidCandidate { index, source } => {
                assert_eq!(index, 1);
                assert_eq!(
                    source,
                    CandidateError::UnsafePathComponent {
                        field: "name",
                        value: "../../../escaped.zip".to_string(),
                    }
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fx.registry.snapshot().unwrap().artifact_count(), 0);
    }

    #[test]
    fn test_cancelled_before_start_writes_nothing() {
        let fx = fixture(AcquisitionPolicy::pair("alpha"));
        let candidates = fx
            .reconciler
            .validate(vec![ArtifactDescriptor::new("a.zip", 2024, 3)])
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = fx.reconciler.apply(candidates, &cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(fx.registry.snapshot().unwrap().artifact_count(), 0);
    }
}
