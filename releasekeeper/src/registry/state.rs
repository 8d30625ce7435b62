//! In-memory registry state shared by all registry backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Mutation, RegistryError, RegistryResult};
use crate::model::{ArtifactRecord, Bundle, GroupingKey, NaturalKey};

/// Complete contents of a vendor registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryState {
    artifacts: BTreeMap<NaturalKey, ArtifactRecord>,
    bundles: BTreeMap<GroupingKey, Bundle>,
}

/// Serialized layout of a registry file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistryDocument {
    pub format: u32,
    pub vendor: String,
    pub artifacts: Vec<ArtifactRecord>,
    pub bundles: Vec<Bundle>,
}

/// Current registry file format.
pub(crate) const REGISTRY_FORMAT: u32 = 1;

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifact(&self, key: &NaturalKey) -> Option<&ArtifactRecord> {
        self.artifacts.get(key)
    }

    pub fn bundle(&self, key: &GroupingKey) -> Option<&Bundle> {
        self.bundles.get(key)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.artifacts.values()
    }

    /// Bundles in grouping-key order.
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.values()
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Records not yet on disk, in natural-key order.
    pub fn pending(&self) -> Vec<ArtifactRecord> {
        self.artifacts
            .values()
            .filter(|r| !r.on_disk)
            .cloned()
            .collect()
    }

    /// Apply a batch to a copy of this state, returning the new state.
    ///
    /// Rejected batches leave `self` untouched. The following are refused:
    /// - inserting an already registered artifact
    /// - updating an unknown artifact or changing its identity fields
    /// - moving `on_disk` from true to false, or rewriting `downloaded_at`
    /// - un-readying a bundle or rewriting its ready snapshot
    /// - removing bundle members
    pub fn apply(&self, batch: &[Mutation]) -> RegistryResult<Self> {
        let mut next = self.clone();
        for mutation in batch {
            match mutation {
                Mutation::InsertArtifact(record) => next.insert_artifact(record)?,
                Mutation::UpdateArtifact(record) => next.update_artifact(record)?,
                Mutation::PutBundle(bundle) => next.put_bundle(bundle)?,
            }
        }
        Ok(next)
    }

    fn insert_artifact(&mut self, record: &ArtifactRecord) -> RegistryResult<()> {
        if self.artifacts.contains_key(&record.natural_key) {
            return Err(RegistryError::DuplicateArtifact(record.natural_key.clone()));
        }
        if record.on_disk != record.downloaded_at.is_some() {
            return Err(violation(
                &record.natural_key,
                "downloaded_at must be set exactly when on_disk is true",
            ));
        }
        self.artifacts
            .insert(record.natural_key.clone(), record.clone());
        Ok(())
    }

    fn update_artifact(&mut self, record: &ArtifactRecord) -> RegistryResult<()> {
        let existing = self
            .artifacts
            .get(&record.natural_key)
            .ok_or_else(|| RegistryError::UnknownArtifact(record.natural_key.clone()))?;

        if existing.grouping_key() != record.grouping_key()
            || existing.name != record.name
            || existing.first_seen_at != record.first_seen_at
        {
            return Err(violation(&record.natural_key, "identity fields are immutable"));
        }
        if existing.on_disk && !record.on_disk {
            return Err(violation(&record.natural_key, "on_disk cannot revert to false"));
        }
        if existing.downloaded_at.is_some() && existing.downloaded_at != record.downloaded_at {
            return Err(violation(&record.natural_key, "downloaded_at is set once"));
        }
        if record.on_disk != record.downloaded_at.is_some() {
            return Err(violation(
                &record.natural_key,
                "downloaded_at must be set exactly when on_disk is true",
            ));
        }

        self.artifacts
            .insert(record.natural_key.clone(), record.clone());
        Ok(())
    }

    fn put_bundle(&mut self, bundle: &Bundle) -> RegistryResult<()> {
        let key = bundle.key();

        if let Some(existing) = self.bundles.get(&key) {
            if !existing.members.is_subset(&bundle.members) {
                return Err(violation(&key, "bundle members are append-only"));
            }
            if existing.ready
                && (!bundle.ready
                    || existing.ready_at != bundle.ready_at
                    || existing.member_count_at_ready != bundle.member_count_at_ready)
            {
                return Err(violation(&key, "ready snapshot is immutable"));
            }
        }

        if bundle.ready != bundle.ready_at.is_some()
            || bundle.ready != bundle.member_count_at_ready.is_some()
        {
            return Err(violation(&key, "ready snapshot must accompany ready flag"));
        }
        if let Some(member) = bundle
            .members
            .iter()
            .find(|m| !self.artifacts.contains_key(*m))
        {
            return Err(violation(
                &key,
                &format!("member {} is not a registered artifact", member),
            ));
        }

        self.bundles.insert(key, bundle.clone());
        Ok(())
    }

    pub(crate) fn to_document(&self, vendor: &str) -> RegistryDocument {
        RegistryDocument {
            format: REGISTRY_FORMAT,
            vendor: vendor.to_string(),
            artifacts: self.artifacts.values().cloned().collect(),
            bundles: self.bundles.values().cloned().collect(),
        }
    }

    /// Rebuild state from a document, refusing duplicate keys.
    pub(crate) fn from_document(doc: RegistryDocument) -> Result<Self, String> {
        if doc.format != REGISTRY_FORMAT {
            return Err(format!("unsupported format version {}", doc.format));
        }

        let mut state = Self::new();
        for record in doc.artifacts {
            if state
                .artifacts
                .insert(record.natural_key.clone(), record)
                .is_some()
            {
                return Err("duplicate artifact key".to_string());
            }
        }
        for bundle in doc.bundles {
            if state.bundles.insert(bundle.key(), bundle).is_some() {
                return Err("duplicate bundle key".to_string());
            }
        }
        Ok(state)
    }
}

fn violation(subject: &dyn std::fmt::Display, reason: &str) -> RegistryError {
    RegistryError::InvariantViolation {
        subject: subject.to_string(),
        reason: reason.to_string(),
    }
}
