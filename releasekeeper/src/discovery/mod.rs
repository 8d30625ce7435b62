//! Discovery adapter contract.
//!
//! Site-specific discovery (portal scraping, login flows, FTP listings,
//! mailbox polling) lives outside this crate. What the pipeline needs from it
//! is a finite list of [`ArtifactDescriptor`]s per pass, or an
//! [`AdapterError`] that aborts the pass without touching the registry.
//!
//! Adapters need not be incremental: returning everything every pass is
//! normal and handled by the reconciler.
//!
//! # Adapters in this crate
//!
//! - [`ManifestDiscovery`] - reads a JSON manifest produced by an external job
//! - [`StaticDiscovery`] - an in-process list, replaceable between passes

mod manifest;
mod fixed;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::model::ArtifactDescriptor;
use crate::policy::CandidateError;

pub use fixed::StaticDiscovery;
pub use manifest::ManifestDiscovery;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why discovery failed for this pass.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The remote source (or the manifest standing in for it) could not be reached.
    #[error("discovery source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// The remote side rejected our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote side answered with something we do not understand.
    #[error("unexpected remote state: {0}")]
    UnexpectedRemoteState(String),

    /// A reported candidate cannot be keyed or grouped under the vendor policy.
    #[error("invalid candidate #{index}: {source}")]
    InvalidCandidate {
        index: usize,
        #[source]
        source: CandidateError,
    },
}

/// Produces the candidate artifacts for one pass.
pub trait DiscoveryAdapter: Send + Sync {
    /// Short name for logs and status messages.
    fn name(&self) -> &str;

    /// List the candidates currently published by the vendor.
    fn discover(&self) -> BoxFuture<'_, Result<Vec<ArtifactDescriptor>, AdapterError>>;
}
