//! Lazy bundle creation and membership.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{ArtifactRecord, Bundle};
use crate::registry::{Registry, RegistryResult};

/// Places new records into their release bundle.
///
/// The aggregator never writes: it returns the updated bundle so the caller
/// can commit it together with the record.
pub struct BundleAggregator {
    registry: Arc<dyn Registry>,
}

impl BundleAggregator {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// The record's bundle with the record added as a member.
    ///
    /// Returns the bundle and whether it had to be created.
    pub fn attach(
        &self,
        record: &ArtifactRecord,
        now: DateTime<Utc>,
    ) -> RegistryResult<(Bundle, bool)> {
        let existing = self.registry.bundle(&record.grouping_key())?;
        let created = existing.is_none();
        Ok((with_member(existing, record, now), created))
    }
}

/// Add `record` to `existing`, creating a not-ready bundle when absent.
pub fn with_member(existing: Option<Bundle>, record: &ArtifactRecord, now: DateTime<Utc>) -> Bundle {
    let mut bundle = existing.unwrap_or_else(|| Bundle::new(&record.grouping_key(), now));
    bundle.members.insert(record.natural_key.clone());
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactDescriptor, GroupingKey, NaturalKey};
    use crate::registry::{MemoryRegistry, Mutation};

    fn record(name: &str) -> ArtifactRecord {
        ArtifactRecord::first_sighting(
            NaturalKey::new(format!("{}|2024-03", name)),
            &ArtifactDescriptor::new(name, 2024, 3),
            &GroupingKey::period(2024, 3),
            false,
            Utc::now(),
        )
    }

    #[test]
    fn test_creates_bundle_on_first_member() {
        let registry = Arc::new(MemoryRegistry::new());
        let aggregator = BundleAggregator::new(registry);

        let (bundle, created) = aggregator.attach(&record("a.zip"), Utc::now()).unwrap();

        assert!(created);
        assert!(!bundle.ready);
        assert_eq!(bundle.key(), GroupingKey::period(2024, 3));
        assert_eq!(bundle.member_count(), 1);
    }

    #[test]
    fn test_appends_to_existing_bundle() {
        let registry = Arc::new(MemoryRegistry::new());
        let first = record("a.zip");
        let bundle = with_member(None, &first, Utc::now());
        registry
            .commit(vec![
                Mutation::InsertArtifact(first.clone()),
                Mutation::PutBundle(bundle.clone()),
            ])
            .unwrap();

        let aggregator = BundleAggregator::new(registry);
        let (next, created) = aggregator.attach(&record("b.zip"), Utc::now()).unwrap();

        assert!(!created);
        assert_eq!(next.created_at, bundle.created_at);
        assert_eq!(next.member_count(), 2);
        assert!(next.contains(&first.natural_key));
    }

    #[test]
    fn test_ready_snapshot_survives_new_member() {
        let first = record("a.zip");
        let ready = with_member(None, &first, Utc::now()).marked_ready(Utc::now());

        let next = with_member(Some(ready.clone()), &record("b.zip"), Utc::now());

        assert!(next.ready);
        assert_eq!(next.ready_at, ready.ready_at);
        assert_eq!(next.member_count_at_ready, Some(1));
        assert_eq!(next.member_count(), 2);
    }
}
