//! In-process registry.

use parking_lot::RwLock;

use super::{Mutation, Registry, RegistryResult, RegistryState};
use crate::model::{ArtifactRecord, Bundle, GroupingKey, NaturalKey};

/// Registry held entirely in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: RwLock<RegistryState>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing state.
    pub fn with_state(state: RegistryState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Registry for MemoryRegistry {
    fn artifact(&self, key: &NaturalKey) -> RegistryResult<Option<ArtifactRecord>> {
        Ok(self.state.read().artifact(key).cloned())
    }

    fn bundle(&self, key: &GroupingKey) -> RegistryResult<Option<Bundle>> {
        Ok(self.state.read().bundle(key).cloned())
    }

    fn snapshot(&self) -> RegistryResult<RegistryState> {
        Ok(self.state.read().clone())
    }

    fn commit(&self, batch: Vec<Mutation>) -> RegistryResult<()> {
        let mut state = self.state.write();
        *state = state.apply(&batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactDescriptor;
    use chrono::Utc;

    #[test]
    fn test_commit_and_lookup() {
        let registry = MemoryRegistry::new();
        let key = NaturalKey::new("a|2024-03");
        let grouping = GroupingKey::period(2024, 3);
        let record = ArtifactRecord::first_sighting(
            key.clone(),
            &ArtifactDescriptor::new("a", 2024, 3),
            &grouping,
            false,
            Utc::now(),
        );
        let mut bundle = Bundle::new(&grouping, Utc::now());
        bundle.members.insert(key.clone());

        registry
            .commit(vec![
                Mutation::InsertArtifact(record.clone()),
                Mutation::PutBundle(bundle),
            ])
            .unwrap();

        assert_eq!(registry.artifact(&key).unwrap(), Some(record));
        assert!(registry.bundle(&grouping).unwrap().unwrap().contains(&key));
        assert_eq!(registry.snapshot().unwrap().artifact_count(), 1);
    }

    #[test]
    fn test_rejected_commit_keeps_state() {
        let registry = MemoryRegistry::new();
        let mut bundle = Bundle::new(&GroupingKey::period(2024, 3), Utc::now());
        bundle.members.insert(NaturalKey::new("ghost"));

        assert!(registry.commit(vec![Mutation::PutBundle(bundle)]).is_err());
        assert_eq!(registry.snapshot().unwrap().bundle_count(), 0);
    }

    #[test]
    fn test_with_state_serves_seeded_records() {
        let grouping = GroupingKey::period(2024, 3);
        let record = ArtifactRecord::first_sighting(
            NaturalKey::new("a|2024-03"),
            &ArtifactDescriptor::new("a", 2024, 3),
            &grouping,
            true,
            Utc::now(),
        );
        let mut bundle = Bundle::new(&grouping, Utc::now());
        bundle.members.insert(record.natural_key.clone());
        let seeded = RegistryState::new()
            .apply(&[
                Mutation::InsertArtifact(record.clone()),
                Mutation::PutBundle(bundle),
            ])
            .unwrap();

        let registry = MemoryRegistry::with_state(seeded.clone());

        assert_eq!(registry.snapshot().unwrap(), seeded);
        assert_eq!(
            registry.artifact(&record.natural_key).unwrap(),
            Some(record.clone())
        );
        assert!(registry
            .commit(vec![Mutation::InsertArtifact(record)])
            .is_err());
    }
}
