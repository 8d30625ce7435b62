//! Download coordinator: drives pending artifacts through acquisition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{AcquisitionError, TransferStatus, Transport};
use crate::model::{ArtifactRecord, NaturalKey};
use crate::presence::{marker_path, DiskPresenceChecker, SentinelState};
use crate::registry::{Mutation, Registry, RegistryResult};

/// Per-artifact acquisition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPhase {
    /// Not on disk, nothing started.
    Pending,
    /// Transport started, polling the sentinel.
    Acquiring,
    /// Confirmed on disk and committed.
    Complete,
    /// Left pending for the next pass.
    StillPending,
}

/// Result of acquiring one artifact.
#[derive(Debug)]
pub enum AcquireOutcome {
    /// The artifact is on disk; the committed record is returned.
    Complete(ArtifactRecord),
    /// Cancellation was requested; the record is untouched.
    Cancelled,
    /// The transfer failed; the record is untouched.
    Failed(AcquisitionError),
}

impl AcquireOutcome {
    pub fn phase(&self) -> AcquisitionPhase {
        match self {
            AcquireOutcome::Complete(_) => AcquisitionPhase::Complete,
            AcquireOutcome::Cancelled | AcquireOutcome::Failed(_) => AcquisitionPhase::StillPending,
        }
    }
}

/// Summary of one coordinator run.
#[derive(Debug, Default, Clone)]
pub struct AcquisitionReport {
    /// Artifacts confirmed on disk during this run.
    pub completed: Vec<NaturalKey>,
    /// Artifacts whose transfer failed, with the reason.
    pub failed: Vec<(NaturalKey, String)>,
    /// Artifacts not attempted or interrupted because of cancellation.
    pub still_pending: Vec<NaturalKey>,
    /// Whether the run stopped because cancellation was requested.
    pub cancelled: bool,
}

impl AcquisitionReport {
    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Acquires not-yet-present artifacts one at a time.
///
/// Polling is an iterative loop with a cancellable sleep: cancellation is
/// observed within one poll interval and never mutates the record being
/// acquired.
pub struct DownloadCoordinator {
    transport: Arc<dyn Transport>,
    registry: Arc<dyn Registry>,
    checker: DiskPresenceChecker,
    poll_interval: Duration,
    timeout: Duration,
}

impl DownloadCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<dyn Registry>,
        checker: DiskPresenceChecker,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            checker,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    /// Acquire every record in `pending`, in order.
    ///
    /// `on_progress(done, total)` is called after each artifact. Individual
    /// acquisition failures are collected in the report; only registry
    /// failures abort the run.
    pub async fn run(
        &self,
        pending: Vec<ArtifactRecord>,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(usize, usize, &ArtifactRecord),
    ) -> RegistryResult<AcquisitionReport> {
        let total = pending.len();
        let mut report = AcquisitionReport::default();
        let mut queue = pending.into_iter();

        while let Some(record) = queue.next() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.still_pending.push(record.natural_key);
                report
                    .still_pending
                    .extend(queue.by_ref().map(|r| r.natural_key));
                break;
            }

            match self.acquire(&record, cancel).await? {
                AcquireOutcome::Complete(done) => report.completed.push(done.natural_key),
                AcquireOutcome::Failed(e) => {
                    warn!(
                        transport = self.transport.name(),
                        key = %record.natural_key,
                        error = %e,
                        "Acquisition failed, artifact stays pending"
                    );
                    report.failed.push((record.natural_key.clone(), e.to_string()));
                }
                AcquireOutcome::Cancelled => {
                    report.cancelled = true;
                    report.still_pending.push(record.natural_key.clone());
                    report
                        .still_pending
                        .extend(queue.by_ref().map(|r| r.natural_key));
                    break;
                }
            }

            on_progress(report.attempted(), total, &record);
        }

        info!(
            transport = self.transport.name(),
            completed = report.completed.len(),
            failed = report.failed.len(),
            still_pending = report.still_pending.len(),
            cancelled = report.cancelled,
            "Acquisition run finished"
        );
        Ok(report)
    }

    /// Acquire one artifact.
    ///
    /// Returns `Err` only if committing a confirmed completion fails.
    pub async fn acquire(
        &self,
        record: &ArtifactRecord,
        cancel: &CancellationToken,
    ) -> RegistryResult<AcquireOutcome> {
        if record.on_disk {
            return Ok(AcquireOutcome::Complete(record.clone()));
        }

        let target = self.checker.record_target(record);
        let marker = marker_path(&target, self.checker.sentinel_suffix());

        // A transfer from an interrupted pass may have finished since.
        if self.checker.probe(&target) == SentinelState::Complete {
            debug!(key = %record.natural_key, "Found completed transfer before starting");
            return self.confirm(record);
        }
        if cancel.is_cancelled() {
            return Ok(AcquireOutcome::Cancelled);
        }

        debug!(
            key = %record.natural_key,
            target = %target.display(),
            phase = ?AcquisitionPhase::Acquiring,
            "Starting acquisition"
        );
        let transfer_cancel = cancel.child_token();
        let mut handle = match self.transport.begin_acquire(
            record,
            &target,
            &marker,
            transfer_cancel.clone(),
        ) {
            Ok(handle) => handle,
            Err(e) => return Ok(AcquireOutcome::Failed(e)),
        };

        let started = Instant::now();
        let mut finished_with_marker = false;
        loop {
            // Read the transport report before probing: a transport reports
            // success only after its rename, so the probe then sees the file.
            let status = handle.status();
            let state = self.checker.probe(&target);

            match (state, status) {
                (SentinelState::Complete, _) => return self.confirm(record),
                (_, TransferStatus::Failed(e)) => return Ok(AcquireOutcome::Failed(e)),
                (SentinelState::Absent, TransferStatus::Finished) => {
                    return Ok(AcquireOutcome::Failed(AcquisitionError::NoOutput(target)));
                }
                // Reported done but the marker is still there: allow one
                // more poll for the rename to land.
                (SentinelState::InFlight, TransferStatus::Finished) => {
                    if finished_with_marker {
                        warn!(
                            key = %record.natural_key,
                            marker = %marker.display(),
                            "Transport reported success but left its marker"
                        );
                        return Ok(AcquireOutcome::Failed(AcquisitionError::NoOutput(target)));
                    }
                    finished_with_marker = true;
                }
                _ => {}
            }

            if started.elapsed() >= self.timeout {
                transfer_cancel.cancel();
                return Ok(AcquireOutcome::Failed(AcquisitionError::Timeout {
                    key: record.natural_key.clone(),
                    secs: self.timeout.as_secs(),
                }));
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(key = %record.natural_key, "Acquisition cancelled, artifact stays pending");
                    return Ok(AcquireOutcome::Cancelled);
                }

                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn confirm(&self, record: &ArtifactRecord) -> RegistryResult<AcquireOutcome> {
        let done = record.marked_on_disk(Utc::now());
        self.registry
            .commit(vec![Mutation::UpdateArtifact(done.clone())])?;
        info!(key = %done.natural_key, name = %done.name, "Artifact on disk");
        Ok(AcquireOutcome::Complete(done))
    }
}
