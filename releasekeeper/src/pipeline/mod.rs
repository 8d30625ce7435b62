//! The per-vendor acquisition pipeline.
//!
//! # Architecture
//!
//! ```text
//! VendorPipeline::run_pass
//!     │
//!     ├── Stage::Discover    DiscoveryAdapter::discover + Reconciler::validate
//!     ├── Stage::Reconcile   Reconciler::apply (BundleAggregator, DiskPresenceChecker)
//!     ├── Stage::Download    DownloadCoordinator::run over pending records
//!     └── Stage::Evaluate    ReadinessEvaluator::run
//!
//! StatusReporter: InProgress ──► Ready  (finished or cancelled)
//!                            └─► Error  (adapter or registry failure)
//! ```
//!
//! Every vendor uses the same pipeline; only the policy and the injected
//! adapter, transport and registry differ.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = VendorPipeline::new(policy, "/srv/refdata/alpha", adapter, transport, registry);
//! let report = pipeline.run_pass(&CancellationToken::new()).await?;
//! println!("{}", report.summary());
//! ```

mod stage;

pub use stage::Stage;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::acquire::{AcquisitionReport, DownloadCoordinator, Transport};
use crate::discovery::{AdapterError, DiscoveryAdapter};
use crate::policy::AcquisitionPolicy;
use crate::presence::DiskPresenceChecker;
use crate::readiness::{ReadinessEvaluator, ReadinessReport};
use crate::reconcile::{Candidate, ReconcileReport, Reconciler};
use crate::registry::{Registry, RegistryError, RegistryResult};
use crate::status::{ModuleState, StatusReporter};

/// A failure that ends a pass in [`ModuleState::Error`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("discovery failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("registry failure: {0}")]
    Persistence(#[from] RegistryError),
}

/// What one pass did.
#[derive(Debug, Default, Clone)]
pub struct PassReport {
    /// Candidates returned by the adapter.
    pub discovered: usize,
    pub reconcile: ReconcileReport,
    pub acquisition: AcquisitionReport,
    pub readiness: ReadinessReport,
    /// The pass stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl PassReport {
    /// One-line summary for status messages.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} discovered, {} new, {} acquired, {} failed, {} bundles ready",
            self.discovered,
            self.reconcile.inserted.len(),
            self.acquisition.completed.len(),
            self.acquisition.failed.len(),
            self.readiness.newly_ready.len(),
        );
        if self.cancelled {
            summary.insert_str(0, "cancelled: ");
        }
        summary
    }
}

/// One vendor's pass pipeline.
pub struct VendorPipeline {
    policy: AcquisitionPolicy,
    adapter: Arc<dyn DiscoveryAdapter>,
    registry: Arc<dyn Registry>,
    reconciler: Reconciler,
    coordinator: DownloadCoordinator,
    evaluator: ReadinessEvaluator,
    reporter: StatusReporter,
}

impl VendorPipeline {
    pub fn new(
        policy: AcquisitionPolicy,
        storage_root: impl Into<PathBuf>,
        adapter: Arc<dyn DiscoveryAdapter>,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn Registry>,
    ) -> Self {
        let checker = DiskPresenceChecker::for_policy(storage_root, &policy);
        Self {
            reconciler: Reconciler::new(policy.clone(), registry.clone(), checker.clone()),
            coordinator: DownloadCoordinator::new(
                transport,
                registry.clone(),
                checker,
                policy.poll_interval,
                policy.acquire_timeout,
            ),
            evaluator: ReadinessEvaluator::new(policy.clone(), registry.clone()),
            reporter: StatusReporter::new(),
            policy,
            adapter,
            registry,
        }
    }

    /// Report status through an existing reporter.
    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn vendor(&self) -> &str {
        &self.policy.vendor
    }

    pub fn policy(&self) -> &AcquisitionPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Discover and validate this pass's candidates. Writes nothing.
    pub async fn discover(&self) -> Result<Vec<Candidate>, PipelineError> {
        let descriptors = self.adapter.discover().await?;
        Ok(self.reconciler.validate(descriptors)?)
    }

    pub fn reconcile(
        &self,
        candidates: Vec<Candidate>,
        cancel: &CancellationToken,
    ) -> RegistryResult<ReconcileReport> {
        self.reconciler.apply(candidates, cancel)
    }

    /// Acquire every registered artifact not yet on disk.
    pub async fn download(&self, cancel: &CancellationToken) -> RegistryResult<AcquisitionReport> {
        let pending = self.registry.snapshot()?.pending();
        self.coordinator
            .run(pending, cancel, |done, total, record| {
                self.reporter.progress(
                    Stage::Download.progress_at(done, total),
                    format!("{} {} ({}/{})", Stage::Download, record.name, done, total),
                );
            })
            .await
    }

    pub fn evaluate(&self) -> RegistryResult<ReadinessReport> {
        self.evaluator.run()
    }

    // =========================================================================
    // Pass
    // =========================================================================

    /// Run every stage once, reporting through the status reporter.
    ///
    /// Cancellation ends the pass in `Ready` with a cancelled message and
    /// skips the remaining stages. Adapter and registry failures end it in
    /// `Error`; whatever was committed before the failure stays committed.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport, PipelineError> {
        info!(vendor = %self.policy.vendor, "Pass started");
        self.reporter.transition(ModuleState::InProgress, "pass started");

        match self.stages(cancel).await {
            Ok(report) => {
                let summary = report.summary();
                if report.cancelled {
                    warn!(vendor = %self.policy.vendor, summary = %summary, "Pass cancelled");
                } else {
                    info!(vendor = %self.policy.vendor, summary = %summary, "Pass finished");
                }
                self.reporter.transition(ModuleState::Ready, summary);
                Ok(report)
            }
            Err(e) => {
                error!(vendor = %self.policy.vendor, error = %e, "Pass failed");
                self.reporter.transition(ModuleState::Error, e.to_string());
                Err(e)
            }
        }
    }

    async fn stages(&self, cancel: &CancellationToken) -> Result<PassReport, PipelineError> {
        let mut report = PassReport::default();
        let mut candidates = Vec::new();

        for stage in Stage::ALL {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.reporter.progress(stage.band().0, stage.name());

            match stage {
                Stage::Discover => {
                    candidates = self.discover().await?;
                    report.discovered = candidates.len();
                }
                Stage::Reconcile => {
                    report.reconcile = self.reconcile(std::mem::take(&mut candidates), cancel)?;
                    report.cancelled |= report.reconcile.cancelled;
                }
                Stage::Download => {
                    report.acquisition = self.download(cancel).await?;
                    report.cancelled |= report.acquisition.cancelled;
                }
                Stage::Evaluate => {
                    report.readiness = self.evaluate()?;
                }
            }
        }

        Ok(report)
    }
}
