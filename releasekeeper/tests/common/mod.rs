//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use releasekeeper::acquire::{AcquireHandle, AcquisitionError, Transport};
use releasekeeper::discovery::StaticDiscovery;
use releasekeeper::model::{ArtifactDescriptor, ArtifactRecord};
use releasekeeper::pipeline::VendorPipeline;
use releasekeeper::policy::AcquisitionPolicy;
use releasekeeper::registry::{MemoryRegistry, Registry};

/// Transport that writes the target synchronously, unless told to refuse
/// an artifact by name or to hang forever.
#[derive(Default)]
pub struct LocalTransport {
    refuse: Mutex<HashSet<String>>,
    hang: Mutex<bool>,
    started: Mutex<Vec<String>>,
}

impl LocalTransport {
    pub fn refuse(&self, name: &str) {
        self.refuse.lock().insert(name.to_string());
    }

    pub fn allow_all(&self) {
        self.refuse.lock().clear();
    }

    pub fn hang(&self, hang: bool) {
        *self.hang.lock() = hang;
    }

    /// Names of every artifact a transfer was started for.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }
}

impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    fn begin_acquire(
        &self,
        record: &ArtifactRecord,
        target: &Path,
        marker: &Path,
        _cancel: CancellationToken,
    ) -> Result<AcquireHandle, AcquisitionError> {
        self.started.lock().push(record.name.clone());

        if self.refuse.lock().contains(&record.name) {
            return Err(AcquisitionError::Transfer(format!(
                "vendor rejected {}",
                record.name
            )));
        }

        let parent = target.parent().unwrap();
        std::fs::create_dir_all(parent).unwrap();
        std::fs::write(marker, b"partial").unwrap();
        if *self.hang.lock() {
            return Ok(AcquireHandle::detached());
        }

        std::fs::rename(marker, target).unwrap();
        let (tx, handle) = AcquireHandle::channel();
        let _ = tx.send(Ok(()));
        Ok(handle)
    }
}

/// One vendor pipeline over an in-memory registry and a temp storage root.
pub struct Harness {
    pub temp: TempDir,
    pub adapter: Arc<StaticDiscovery>,
    pub transport: Arc<LocalTransport>,
    pub registry: Arc<MemoryRegistry>,
    pub pipeline: VendorPipeline,
}

impl Harness {
    pub fn new(policy: AcquisitionPolicy, candidates: Vec<ArtifactDescriptor>) -> Self {
        let temp = TempDir::new().unwrap();
        let adapter = Arc::new(StaticDiscovery::new(policy.vendor.clone(), candidates));
        let transport = Arc::new(LocalTransport::default());
        let registry = Arc::new(MemoryRegistry::new());
        let pipeline = VendorPipeline::new(
            policy,
            temp.path(),
            adapter.clone(),
            transport.clone(),
            registry.clone(),
        );
        Self {
            temp,
            adapter,
            transport,
            registry,
            pipeline,
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.registry.snapshot().unwrap().artifact_count()
    }

    pub fn bundle_count(&self) -> usize {
        self.registry.snapshot().unwrap().bundle_count()
    }
}

/// `count` descriptors named `<prefix>-<n>.dat` in one cycle of a period.
pub fn cycle_files(prefix: &str, count: usize, cycle: &str) -> Vec<ArtifactDescriptor> {
    (0..count)
        .map(|n| ArtifactDescriptor::new(format!("{}-{}.dat", prefix, n), 2024, 3).with_cycle(cycle))
        .collect()
}
