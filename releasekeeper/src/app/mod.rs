//! Application bootstrap and lifecycle management.
//!
//! This module provides the `ReleaseKeeperApp` type which wires every
//! configured vendor to its registry, discovery adapter and transport, and
//! shuts all vendor services down together.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      ReleaseKeeperApp                          │
//! │                                                                │
//! │  per enabled vendor:                                           │
//! │    JsonFileRegistry  <data_dir>/<vendor>.json                  │
//! │    ManifestDiscovery + CopyTransport | HttpTransport           │
//! │    VendorPipeline ──► VendorService (own task, own schedule)   │
//! │                                                                │
//! │  per disabled vendor:                                          │
//! │    StatusReporter in Disabled                                  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use releasekeeper::app::{AppConfig, ReleaseKeeperApp};
//! use releasekeeper::config::ConfigFile;
//!
//! let config = AppConfig::from_config_file(&ConfigFile::load()?);
//! let app = ReleaseKeeperApp::start(config).await?;
//!
//! // Graceful shutdown
//! app.shutdown().await;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{build_pipeline, ReleaseKeeperApp};
pub use config::AppConfig;
pub use error::AppError;
