//! Release bundles.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupingKey, NaturalKey};

/// A release grouping of artifacts sharing one grouping key.
///
/// `ready` only ever goes from false to true. `ready_at` and
/// `member_count_at_ready` are captured at that first transition and never
/// rewritten, even if more members arrive later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub group_year: i32,
    pub group_month: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_cycle: Option<String>,

    pub members: BTreeSet<NaturalKey>,

    pub ready: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count_at_ready: Option<usize>,

    pub created_at: DateTime<Utc>,
}

impl Bundle {
    /// Create an empty, not-ready bundle.
    pub fn new(key: &GroupingKey, created_at: DateTime<Utc>) -> Self {
        Self {
            group_year: key.year,
            group_month: key.month,
            group_cycle: key.cycle.clone(),
            members: BTreeSet::new(),
            ready: false,
            ready_at: None,
            member_count_at_ready: None,
            created_at,
        }
    }

    pub fn key(&self) -> GroupingKey {
        GroupingKey {
            year: self.group_year,
            month: self.group_month,
            cycle: self.group_cycle.clone(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, key: &NaturalKey) -> bool {
        self.members.contains(key)
    }

    /// A copy of this bundle in the ready state.
    ///
    /// An already-ready bundle is returned unchanged so the first snapshot
    /// survives.
    pub fn marked_ready(&self, at: DateTime<Utc>) -> Self {
        let mut bundle = self.clone();
        if !bundle.ready {
            bundle.ready = true;
            bundle.ready_at = Some(at);
            bundle.member_count_at_ready = Some(bundle.members.len());
        }
        bundle
    }
}
