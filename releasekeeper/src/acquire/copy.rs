//! Filesystem copy transport for drop folders and mirrored shares.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{AcquireHandle, AcquisitionError, Transport};
use crate::model::ArtifactRecord;

/// Copies an artifact from a local or mounted source path.
///
/// The record's `source` is the file to copy. Relative sources are resolved
/// against the configured source root.
#[derive(Debug, Clone, Default)]
pub struct CopyTransport {
    source_root: Option<PathBuf>,
}

impl CopyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sources against `root`.
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    fn resolve(&self, record: &ArtifactRecord) -> Result<PathBuf, AcquisitionError> {
        let source = record
            .source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AcquisitionError::NoSource(record.natural_key.clone()))?;

        let path = PathBuf::from(source);
        Ok(match &self.source_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

impl Transport for CopyTransport {
    fn name(&self) -> &str {
        "copy"
    }

    fn begin_acquire(
        &self,
        record: &ArtifactRecord,
        target: &Path,
        marker: &Path,
        cancel: CancellationToken,
    ) -> Result<AcquireHandle, AcquisitionError> {
        let source = self.resolve(record)?;
        if !source.is_file() {
            return Err(AcquisitionError::io(
                &source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
            ));
        }

        // The marker exists before this returns so the first probe already
        // sees the transfer in flight.
        if let Some(parent) = marker.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AcquisitionError::io(parent, e))?;
        }
        std::fs::File::create(marker).map_err(|e| AcquisitionError::io(marker, e))?;

        let (tx, handle) = AcquireHandle::channel();
        let target = target.to_path_buf();
        let marker = marker.to_path_buf();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;

                _ = cancel.cancelled() => Err(AcquisitionError::Cancelled),
                r = copy_into(&source, &marker) => r,
            };

            let result = match result {
                Ok(bytes) => tokio::fs::rename(&marker, &target)
                    .await
                    .map(|_| bytes)
                    .map_err(|e| AcquisitionError::io(&target, e)),
                Err(e) => Err(e),
            };

            match result {
                Ok(bytes) => {
                    debug!(source = %source.display(), target = %target.display(), bytes, "Copy finished");
                    let _ = tx.send(Ok(()));
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&marker).await;
                    let _ = tx.send(Err(e));
                }
            }
        });

        Ok(handle)
    }
}

async fn copy_into(source: &Path, marker: &Path) -> Result<u64, AcquisitionError> {
    let mut input = tokio::fs::File::open(source)
        .await
        .map_err(|e| AcquisitionError::io(source, e))?;
    let mut output = tokio::fs::File::create(marker)
        .await
        .map_err(|e| AcquisitionError::io(marker, e))?;

    let bytes = tokio::io::copy(&mut input, &mut output)
        .await
        .map_err(|e| AcquisitionError::io(marker, e))?;
    output
        .flush()
        .await
        .map_err(|e| AcquisitionError::io(marker, e))?;
    output
        .sync_all()
        .await
        .map_err(|e| AcquisitionError::io(marker, e))?;

    Ok(bytes)
}
