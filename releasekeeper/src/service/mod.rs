//! Scheduled execution of a vendor pipeline.
//!
//! # Architecture
//!
//! - `VendorService` - owns the background task that waits for the next
//!   slot (or an on-demand trigger) and runs one pass at a time
//! - `VendorHandle` - lightweight, cloneable control surface: status,
//!   start a pass now, cancel the running pass
//!
//! Each pass gets a child of the service's shutdown token, so shutting the
//! service down also cancels a pass in progress.
//!
//! # Example
//!
//! ```ignore
//! let service = VendorService::spawn(pipeline, Schedule::default());
//! let handle = service.handle();
//!
//! handle.request_pass();
//! println!("{}", handle.status().state);
//!
//! service.shutdown().await;
//! ```

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pipeline::VendorPipeline;
use crate::schedule::Schedule;
use crate::status::{StatusReporter, StatusSnapshot};

/// Control surface for one running vendor service.
///
/// Every method returns immediately; none waits on the pipeline.
#[derive(Clone)]
pub struct VendorHandle {
    vendor: String,
    reporter: StatusReporter,
    trigger: Arc<Notify>,
    current_pass: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
}

impl VendorHandle {
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Current status (snapshot).
    pub fn status(&self) -> StatusSnapshot {
        self.reporter.snapshot()
    }

    /// Start a pass now instead of waiting for the schedule.
    ///
    /// A request made while a pass is running starts another pass as soon
    /// as the running one ends.
    pub fn request_pass(&self) {
        info!(vendor = %self.vendor, "Pass requested");
        self.trigger.notify_one();
    }

    /// Request cancellation of the running pass, if any.
    ///
    /// Returns whether a pass was running.
    pub fn cancel_pass(&self) -> bool {
        match &*self.current_pass.lock() {
            Some(token) => {
                info!(vendor = %self.vendor, "Pass cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pass_running(&self) -> bool {
        self.current_pass.lock().is_some()
    }

    /// Ask the service to stop; see [`VendorService::shutdown`] to wait.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Background task running a vendor pipeline on its schedule.
pub struct VendorService {
    handle: VendorHandle,
    task: JoinHandle<()>,
}

impl VendorService {
    /// Spawn the service on the current tokio runtime.
    pub fn spawn(pipeline: VendorPipeline, schedule: Schedule) -> Self {
        let handle = VendorHandle {
            vendor: pipeline.vendor().to_string(),
            reporter: pipeline.reporter().clone(),
            trigger: Arc::new(Notify::new()),
            current_pass: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
        };

        let task = tokio::spawn(run_loop(pipeline, schedule, handle.clone()));
        Self { handle, task }
    }

    pub fn handle(&self) -> VendorHandle {
        self.handle.clone()
    }

    /// Stop the service, cancelling a running pass, and wait for it to end.
    pub async fn shutdown(self) {
        self.handle.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(vendor = %self.handle.vendor, error = %e, "Vendor service task failed");
        }
    }
}

async fn run_loop(pipeline: VendorPipeline, schedule: Schedule, handle: VendorHandle) {
    info!(vendor = %handle.vendor, schedule = %schedule, "Vendor service started");

    loop {
        let now = Local::now();
        let delay = schedule.delay_after(now);
        debug!(
            vendor = %handle.vendor,
            next = %schedule.next_after(now).format("%Y-%m-%d %H:%M"),
            "Waiting for next pass"
        );

        tokio::select! {
            biased;

            _ = handle.shutdown.cancelled() => break,
            _ = handle.trigger.notified() => {}
            _ = tokio::time::sleep(delay) => {}
        }

        let pass_cancel = handle.shutdown.child_token();
        *handle.current_pass.lock() = Some(pass_cancel.clone());
        // Failures are already reported through the status reporter.
        let _ = pipeline.run_pass(&pass_cancel).await;
        *handle.current_pass.lock() = None;
    }

    info!(vendor = %handle.vendor, "Vendor service stopped");
}
