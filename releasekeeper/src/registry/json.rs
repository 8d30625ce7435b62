//! JSON file registry.
//!
//! One file per vendor. Every commit serializes the full post-commit state to
//! a temporary file next to the registry, syncs it and renames it over the
//! registry, so readers and crashes only ever see a complete file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use super::state::RegistryDocument;
use super::{Mutation, Registry, RegistryError, RegistryResult, RegistryState};
use crate::model::{ArtifactRecord, Bundle, GroupingKey, NaturalKey};

/// Registry persisted as a single JSON document.
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    vendor: String,
    state: RwLock<RegistryState>,
}

impl JsonFileRegistry {
    /// Open the registry at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>, vendor: impl Into<String>) -> RegistryResult<Self> {
        let path = path.into();
        let vendor = vendor.into();

        let state = if path.exists() {
            let state = Self::load(&path)?;
            info!(
                vendor = %vendor,
                path = %path.display(),
                artifacts = state.artifact_count(),
                bundles = state.bundle_count(),
                "Registry loaded"
            );
            state
        } else {
            debug!(vendor = %vendor, path = %path.display(), "Registry file absent, starting empty");
            RegistryState::new()
        };

        Ok(Self {
            path,
            vendor,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> RegistryResult<RegistryState> {
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let doc: RegistryDocument =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| RegistryError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        RegistryState::from_document(doc).map_err(|reason| RegistryError::Corrupt {
            path: path.display().to_string(),
            reason,
        })
    }

    fn save(&self, state: &RegistryState) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(|e| io_error(&temp_path, e))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, &state.to_document(&self.vendor)).map_err(
            |e| RegistryError::Backend(format!("failed to serialize registry: {}", e)),
        )?;
        writer.flush().map_err(|e| io_error(&temp_path, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| io_error(&temp_path, e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl Registry for JsonFileRegistry {
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
        let next = state.apply(&batch)?;
        self.save(&next)?;
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactDescriptor;
    use chrono::Utc;
    use tempfile::TempDir;

    fn new_artifact(name: &str) -> Vec<Mutation> {
        let key = NaturalKey::new(name);
        let grouping = GroupingKey::period(2024, 3);
        let record = ArtifactRecord::first_sighting(
            key.clone(),
            &ArtifactDescriptor::new(name, 2024, 3),
            &grouping,
            false,
            Utc::now(),
        );
        let mut bundle = Bundle::new(&grouping, Utc::now());
        bundle.members.insert(key);
        vec![Mutation::InsertArtifact(record), Mutation::PutBundle(bundle)]
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let registry = JsonFileRegistry::open(temp.path().join("alpha.json"), "alpha").unwrap();

        assert_eq!(registry.snapshot().unwrap().artifact_count(), 0);
        assert!(!registry.path().exists());
    }

    #[test]
    fn test_commit_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("alpha.json");

        {
            let registry = JsonFileRegistry::open(&path, "alpha").unwrap();
            registry.commit(new_artifact("a")).unwrap();
        }

        let reopened = JsonFileRegistry::open(&path, "alpha").unwrap();
        let snapshot = reopened.snapshot().unwrap();
        assert_eq!(snapshot.artifact_count(), 1);
        assert_eq!(snapshot.bundle_count(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_rejected_commit_does_not_touch_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("alpha.json");
        let registry = JsonFileRegistry::open(&path, "alpha").unwrap();
        registry.commit(new_artifact("a")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(registry.commit(new_artifact("a")).is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(registry.snapshot().unwrap().artifact_count(), 1);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("alpha.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileRegistry::open(&path, "alpha").unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn test_file_layout_is_camel_case() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("alpha.json");
        let registry = JsonFileRegistry::open(&path, "alpha").unwrap();
        registry.commit(new_artifact("a")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"naturalKey\""));
        assert!(raw.contains("\"onDisk\": false"));
        assert!(raw.contains("\"groupMonth\": 3"));
        assert!(raw.contains("\"vendor\": \"alpha\""));
    }
}
