//! Transport contract used by the download coordinator.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use crate::model::{ArtifactRecord, NaturalKey};

/// Why a single acquisition did not complete.
///
/// None of these abort the pass; the artifact stays pending and is retried
/// on the next pass.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("artifact {0} has no source locator")]
    NoSource(NaturalKey),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("transfer ended without producing {}", .0.display())]
    NoOutput(PathBuf),

    #[error("acquisition of {key} timed out after {secs}s")]
    Timeout { key: NaturalKey, secs: u64 },

    #[error("transfer cancelled")]
    Cancelled,
}

impl AcquisitionError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the transport has reported so far.
#[derive(Debug)]
pub enum TransferStatus {
    /// No report yet.
    Running,
    /// The transport says it finished successfully.
    Finished,
    /// The transport gave up.
    Failed(AcquisitionError),
}

/// Sending half given to a transport's background work.
pub type OutcomeSender = oneshot::Sender<Result<(), AcquisitionError>>;

/// Handle to one in-flight acquisition.
///
/// The filesystem sentinel is authoritative for completion; the handle only
/// lets a transport report failures early instead of waiting for the
/// coordinator's timeout.
#[derive(Debug)]
pub struct AcquireHandle {
    outcome: Option<oneshot::Receiver<Result<(), AcquisitionError>>>,
    finished: bool,
}

impl AcquireHandle {
    /// Handle plus the sender the transport reports through.
    pub fn channel() -> (OutcomeSender, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                outcome: Some(rx),
                finished: false,
            },
        )
    }

    /// Handle for a transport that never reports; completion is observed
    /// through the sentinel alone.
    pub fn detached() -> Self {
        Self {
            outcome: None,
            finished: false,
        }
    }

    /// Non-blocking check of the transport's report.
    ///
    /// A transport that drops its sender without reporting counts as
    /// finished; the coordinator then relies on the sentinel to decide.
    pub fn status(&mut self) -> TransferStatus {
        if self.finished {
            return TransferStatus::Finished;
        }
        let Some(rx) = self.outcome.as_mut() else {
            return TransferStatus::Running;
        };

        match rx.try_recv() {
            Ok(Ok(())) | Err(TryRecvError::Closed) => {
                self.finished = true;
                self.outcome = None;
                TransferStatus::Finished
            }
            Ok(Err(e)) => {
                self.finished = true;
                self.outcome = None;
                TransferStatus::Failed(e)
            }
            Err(TryRecvError::Empty) => TransferStatus::Running,
        }
    }
}

/// Vendor-specific way of getting an artifact onto local storage.
///
/// Implementations must write to the partial-file marker
/// (`<target><suffix>`) and only move the data onto `target` once the
/// transfer is complete. `begin_acquire` returns immediately; the work runs
/// in the background and should stop when `cancel` fires.
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    fn begin_acquire(
        &self,
        record: &ArtifactRecord,
        target: &Path,
        marker: &Path,
        cancel: CancellationToken,
    ) -> Result<AcquireHandle, AcquisitionError>;
}
