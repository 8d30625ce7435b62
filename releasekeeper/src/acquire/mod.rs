//! Acquisition of artifacts that are not yet on local storage.
//!
//! # Architecture
//!
//! ```text
//! DownloadCoordinator
//!         │
//!         ├── Transport (trait)          begin_acquire(record, target) -> AcquireHandle
//!         │       ├── CopyTransport      drop folders, mirrored shares
//!         │       └── HttpTransport      portal download URLs
//!         │
//!         └── DiskPresenceChecker        completion-sentinel probe
//! ```
//!
//! Per artifact the coordinator walks a small state machine:
//!
//! ```text
//! Pending ──► Acquiring ──┬──► Complete       (on_disk = true, committed)
//!                         └──► StillPending   (cancelled / failed / timed out;
//!                                              record untouched, retried next pass)
//! ```
//!
//! Completion is detected by polling the target path: while a transport is
//! writing, `<target><suffix>` exists; the transfer is complete once the
//! marker is gone and the target exists.

mod coordinator;
mod copy;
mod http;
mod transport;

pub use coordinator::{AcquireOutcome, AcquisitionPhase, AcquisitionReport, DownloadCoordinator};
pub use copy::CopyTransport;
pub use http::HttpTransport;
pub use transport::{
    AcquireHandle, AcquisitionError, OutcomeSender, Transport, TransferStatus,
};
