//! In-process candidate list.

use parking_lot::Mutex;

use super::{AdapterError, BoxFuture, DiscoveryAdapter};
use crate::model::ArtifactDescriptor;

enum Next {
    Candidates(Vec<ArtifactDescriptor>),
    Fail(String),
}

/// Adapter returning a fixed list of candidates on every pass.
///
/// The list can be replaced between passes, and a one-shot failure can be
/// armed to exercise the adapter-error path.
pub struct StaticDiscovery {
    name: String,
    next: Mutex<Next>,
}

impl StaticDiscovery {
    pub fn new(name: impl Into<String>, candidates: Vec<ArtifactDescriptor>) -> Self {
        Self {
            name: name.into(),
            next: Mutex::new(Next::Candidates(candidates)),
        }
    }

    /// Replace the candidate list for subsequent passes.
    pub fn set_candidates(&self, candidates: Vec<ArtifactDescriptor>) {
        *self.next.lock() = Next::Candidates(candidates);
    }

    /// Make every following pass fail with `reason` until
    /// [`set_candidates`](Self::set_candidates) is called again.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.next.lock() = Next::Fail(reason.into());
    }
}

impl DiscoveryAdapter for StaticDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self) -> BoxFuture<'_, Result<Vec<ArtifactDescriptor>, AdapterError>> {
        let result = match &*self.next.lock() {
            Next::Candidates(candidates) => Ok(candidates.clone()),
            Next::Fail(reason) => Err(AdapterError::Unavailable {
                source_name: self.name.clone(),
                reason: reason.clone(),
            }),
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_same_candidates_every_pass() {
        let adapter = StaticDiscovery::new(
            "fixture",
            vec![ArtifactDescriptor::new("a.dat", 2024, 3)],
        );

        assert_eq!(adapter.discover().await.unwrap().len(), 1);
        assert_eq!(adapter.discover().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_then_recover() {
        let adapter = StaticDiscovery::new("fixture", Vec::new());
        adapter.fail_with("portal down");

        let err = adapter.discover().await.unwrap_err();
        assert!(err.to_string().contains("portal down"));

        adapter.set_candidates(vec![ArtifactDescriptor::new("a.dat", 2024, 3)]);
        assert_eq!(adapter.discover().await.unwrap().len(), 1);
    }
}
