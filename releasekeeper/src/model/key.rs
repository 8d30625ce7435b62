//! Identity types for artifacts and bundles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Vendor-defined unique identity of an artifact.
///
/// The shape of the key (name + period, or a remote identifier) is decided
/// by the vendor's [`crate::policy::NaturalKeyShape`]; this type only carries
/// the rendered value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    /// Wrap an already rendered key.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The rendered key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Release period (and optional cycle/variant) a bundle is tracked under.
///
/// Ordering is chronological, then by cycle with "no cycle" first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupingKey {
    pub year: i32,
    pub month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<String>,
}

impl GroupingKey {
    /// Key for a plain monthly period.
    pub fn period(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            cycle: None,
        }
    }

    /// Key for a period split into cycles/variants.
    pub fn with_cycle(year: i32, month: u32, cycle: impl Into<String>) -> Self {
        Self {
            year,
            month,
            cycle: Some(cycle.into()),
        }
    }

    /// The key of the bundle with the same period but another cycle.
    pub fn sibling(&self, cycle: &str) -> Self {
        Self::with_cycle(self.year, self.month, cycle)
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)?;
        if let Some(cycle) = &self.cycle {
            write!(f, "/{}", cycle)?;
        }
        Ok(())
    }
}
