//! Core data model: discovered descriptors, persisted records and bundles.
//!
//! ```text
//! ArtifactDescriptor ──(policy)──► ArtifactRecord ──(grouping key)──► Bundle
//!   (per pass, transient)          (append-only ledger)               (1 ─ * records)
//! ```

mod artifact;
mod bundle;
mod key;

pub use artifact::{ArtifactDescriptor, ArtifactRecord};
pub use bundle::Bundle;
pub use key::{GroupingKey, NaturalKey};
