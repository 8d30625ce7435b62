//! ReleaseKeeper - periodic vendor release tracking.
//!
//! This library discovers reference-data artifacts published by external
//! vendors, reconciles them against a persistent registry, acquires the ones
//! not yet on local storage and gates release bundles for downstream builds
//! once they are complete.
//!
//! # Architecture
//!
//! ```text
//! DiscoveryAdapter ──► Reconciler ──► BundleAggregator ──► DiskPresenceChecker
//!                                                                 │
//!      StatusReporter ◄── ReadinessEvaluator ◄── DownloadCoordinator
//! ```
//!
//! Every vendor runs the same [`pipeline::VendorPipeline`], parameterised by
//! an [`policy::AcquisitionPolicy`] and injected adapter, transport and
//! registry implementations.

pub mod acquire;
pub mod app;
pub mod config;
pub mod discovery;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod presence;
pub mod readiness;
pub mod reconcile;
pub mod registry;
pub mod schedule;
pub mod service;
pub mod status;

/// Library version, used in logs and registry headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
