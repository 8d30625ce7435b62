//! Manifest-file discovery.
//!
//! External scrapers write the descriptors they found to a JSON file:
//!
//! ```json
//! [
//!   { "name": "chart.zip", "groupYear": 2024, "groupMonth": 3,
//!     "source": "https://vendor.example/dl/chart.zip" }
//! ]
//! ```
//!
//! This adapter turns that file into the descriptor stream.

use std::path::PathBuf;

use tracing::debug;

use super::{AdapterError, BoxFuture, DiscoveryAdapter};
use crate::model::ArtifactDescriptor;

/// Reads candidates from a JSON manifest on every pass.
#[derive(Debug, Clone)]
pub struct ManifestDiscovery {
    name: String,
    path: PathBuf,
}

impl ManifestDiscovery {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    async fn read(&self) -> Result<Vec<ArtifactDescriptor>, AdapterError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AdapterError::Unavailable {
                source_name: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        let candidates: Vec<ArtifactDescriptor> = serde_json::from_slice(&bytes).map_err(|e| {
            AdapterError::UnexpectedRemoteState(format!(
                "manifest {} is not a descriptor list: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            adapter = %self.name,
            manifest = %self.path.display(),
            count = candidates.len(),
            "Manifest read"
        );
        Ok(candidates)
    }
}

impl DiscoveryAdapter for ManifestDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self) -> BoxFuture<'_, Result<Vec<ArtifactDescriptor>, AdapterError>> {
        Box::pin(self.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("alpha.json");
        fs::write(
            &path,
            r#"[
                {"name": "a.zip", "groupYear": 2024, "groupMonth": 3, "source": "http://x/a.zip"},
                {"name": "b.zip", "groupYear": 2024, "groupMonth": 3, "remoteId": "77"}
            ]"#,
        )
        .unwrap();

        let adapter = ManifestDiscovery::new("alpha", &path);
        let candidates = adapter.discover().await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].source.as_deref(), Some("http://x/a.zip"));
        assert_eq!(candidates[1].remote_id.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let adapter = ManifestDiscovery::new("alpha", temp.path().join("nope.json"));

        let err = adapter.discover().await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_unexpected_state() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("alpha.json");
        fs::write(&path, r#"{"artifacts": 3}"#).unwrap();

        let err = ManifestDiscovery::new("alpha", &path)
            .discover()
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnexpectedRemoteState(_)));
    }
}
