//! Persistent artifact and bundle registry.
//!
//! The registry is the append-only ledger of everything a vendor pipeline has
//! seen. It is injected into the pipeline as `Arc<dyn Registry>` so tests can
//! substitute doubles.
//!
//! # Commit discipline
//!
//! Every state change goes through [`Registry::commit`] with a small batch of
//! [`Mutation`]s that is applied all-or-nothing. The pipeline commits one
//! candidate (record + bundle membership), one completed acquisition, or one
//! readiness transition per batch, so an interrupted pass never leaves a
//! half-written candidate behind and a retried pass converges to the same
//! end state.
//!
//! The registry also refuses mutations that would break the ledger's
//! invariants (see [`RegistryState::apply`]).
//!
//! # Implementations
//!
//! - [`MemoryRegistry`] - in-process, for tests and embedding
//! - [`JsonFileRegistry`] - one JSON file per vendor, atomically replaced

mod json;
mod memory;
mod state;

use thiserror::Error;

use crate::model::{ArtifactRecord, Bundle, GroupingKey, NaturalKey};

pub use json::JsonFileRegistry;
pub use memory::MemoryRegistry;
pub use state::RegistryState;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised by registry implementations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt registry {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("artifact {0} already registered")]
    DuplicateArtifact(NaturalKey),

    #[error("artifact {0} is not registered")]
    UnknownArtifact(NaturalKey),

    #[error("rejected change to {subject}: {reason}")]
    InvariantViolation { subject: String, reason: String },

    #[error("registry backend error: {0}")]
    Backend(String),
}

/// One change to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Register a first-sighted artifact.
    InsertArtifact(ArtifactRecord),
    /// Replace an existing artifact record (on-disk transition).
    UpdateArtifact(ArtifactRecord),
    /// Create or replace a bundle.
    PutBundle(Bundle),
}

/// Storage for one vendor's artifacts and bundles.
pub trait Registry: Send + Sync {
    /// Look up one artifact.
    fn artifact(&self, key: &NaturalKey) -> RegistryResult<Option<ArtifactRecord>>;

    /// Look up one bundle.
    fn bundle(&self, key: &GroupingKey) -> RegistryResult<Option<Bundle>>;

    /// Point-in-time copy of the whole registry.
    fn snapshot(&self) -> RegistryResult<RegistryState>;

    /// Apply a batch of mutations atomically.
    ///
    /// Either every mutation is applied and persisted, or none is.
    fn commit(&self, batch: Vec<Mutation>) -> RegistryResult<()>;
}
