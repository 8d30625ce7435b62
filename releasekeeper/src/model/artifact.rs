//! Artifact descriptors (what discovery reports) and records (what the
//! registry keeps).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupingKey, NaturalKey};

/// One remote file reported by a discovery adapter for the current pass.
///
/// Adapters are not required to be incremental; the same descriptor may be
/// reported on every pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    /// File name as published by the vendor.
    pub name: String,

    /// Identifier assigned by the remote side, if the vendor exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    /// Locator handed to the transport (URL, share path, mailbox reference).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub group_year: i32,
    pub group_month: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_cycle: Option<String>,
}

impl ArtifactDescriptor {
    /// Create a descriptor for a plain monthly period.
    pub fn new(name: impl Into<String>, year: i32, month: u32) -> Self {
        Self {
            name: name.into(),
            remote_id: None,
            source: None,
            group_year: year,
            group_month: month,
            group_cycle: None,
        }
    }

    /// Set the cycle/variant.
    pub fn with_cycle(mut self, cycle: impl Into<String>) -> Self {
        self.group_cycle = Some(cycle.into());
        self
    }

    /// Set the remote identifier.
    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    /// Set the transport locator.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Persisted ledger entry for an artifact.
///
/// Created once by the reconciler; afterwards only `on_disk` and
/// `downloaded_at` change, and only in the false→true direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub natural_key: NaturalKey,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub group_year: i32,
    pub group_month: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_cycle: Option<String>,

    pub on_disk: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<DateTime<Utc>>,

    pub first_seen_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Build the first-sighting record for a descriptor.
    ///
    /// `grouping` is the policy-normalised grouping key; when the artifact is
    /// already present, `downloaded_at` is stamped with the sighting time.
    pub fn first_sighting(
        natural_key: NaturalKey,
        descriptor: &ArtifactDescriptor,
        grouping: &GroupingKey,
        on_disk: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            natural_key,
            name: descriptor.name.clone(),
            remote_id: descriptor.remote_id.clone(),
            source: descriptor.source.clone(),
            group_year: grouping.year,
            group_month: grouping.month,
            group_cycle: grouping.cycle.clone(),
            on_disk,
            downloaded_at: on_disk.then_some(now),
            first_seen_at: now,
        }
    }

    /// The bundle this artifact belongs to.
    pub fn grouping_key(&self) -> GroupingKey {
        GroupingKey {
            year: self.group_year,
            month: self.group_month,
            cycle: self.group_cycle.clone(),
        }
    }

    /// A copy of this record marked present on disk at `at`.
    ///
    /// A record that is already on disk is returned unchanged so that
    /// `downloaded_at` keeps its first value.
    pub fn marked_on_disk(&self, at: DateTime<Utc>) -> Self {
        let mut record = self.clone();
        if !record.on_disk {
            record.on_disk = true;
            record.downloaded_at = Some(at);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_first_sighting_not_on_disk() {
        let descriptor = ArtifactDescriptor::new("chart.zip", 2024, 3).with_source("a/chart.zip");
        let record = ArtifactRecord::first_sighting(
            NaturalKey::new("k"),
            &descriptor,
            &GroupingKey::period(2024, 3),
            false,
            at(6),
        );

        assert!(!record.on_disk);
        assert!(record.downloaded_at.is_none());
        assert_eq!(record.first_seen_at, at(6));
        assert_eq!(record.source.as_deref(), Some("a/chart.zip"));
    }

    #[test]
    fn test_first_sighting_already_on_disk_stamps_download_time() {
        let descriptor = ArtifactDescriptor::new("chart.zip", 2024, 3);
        let record = ArtifactRecord::first_sighting(
            NaturalKey::new("k"),
            &descriptor,
            &GroupingKey::period(2024, 3),
            true,
            at(6),
        );

        assert!(record.on_disk);
        assert_eq!(record.downloaded_at, Some(at(6)));
    }

    #[test]
    fn test_marked_on_disk_keeps_first_timestamp() {
        let descriptor = ArtifactDescriptor::new("chart.zip", 2024, 3);
        let record = ArtifactRecord::first_sighting(
            NaturalKey::new("k"),
            &descriptor,
            &GroupingKey::period(2024, 3),
            false,
            at(6),
        );

        let first = record.marked_on_disk(at(7));
        assert_eq!(first.downloaded_at, Some(at(7)));

        let second = first.marked_on_disk(at(9));
        assert_eq!(second.downloaded_at, Some(at(7)));
    }

    #[test]
    fn test_descriptor_json_shape() {
        let json = r#"{"name":"a.dat","groupYear":2024,"groupMonth":3,"groupCycle":"N"}"#;
        let descriptor: ArtifactDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor, ArtifactDescriptor::new("a.dat", 2024, 3).with_cycle("N"));
    }
}
