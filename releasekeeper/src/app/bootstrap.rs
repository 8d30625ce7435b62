//! Application bootstrap implementation.
//!
//! Builds one pipeline per enabled vendor, each with its own registry
//! file, and spawns a service for it. Vendors share nothing mutable.

use std::sync::Arc;

use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::acquire::{CopyTransport, HttpTransport, Transport};
use crate::config::{TransportKind, VendorSettings};
use crate::discovery::ManifestDiscovery;
use crate::pipeline::VendorPipeline;
use crate::registry::JsonFileRegistry;
use crate::service::{VendorHandle, VendorService};
use crate::status::{StatusReporter, StatusSnapshot};

/// Build the pipeline for one vendor from its settings.
///
/// Opens (or creates) the vendor's registry file below `config.data_dir`.
pub fn build_pipeline(
    config: &AppConfig,
    settings: &VendorSettings,
) -> Result<VendorPipeline, AppError> {
    std::fs::create_dir_all(&config.data_dir).map_err(|source| AppError::DataDir {
        path: config.data_dir.clone(),
        source,
    })?;

    let registry = JsonFileRegistry::open(config.registry_path(&settings.name), &settings.name)
        .map_err(|source| AppError::Registry {
            vendor: settings.name.clone(),
            source,
        })?;

    let adapter = ManifestDiscovery::new(&settings.name, &settings.manifest);

    let transport: Arc<dyn Transport> = match settings.transport {
        TransportKind::Copy => {
            let mut copy = CopyTransport::new();
            if let Some(root) = &settings.source_root {
                copy = copy.with_source_root(root);
            }
            Arc::new(copy)
        }
        TransportKind::Http => {
            let mut http = HttpTransport::new().with_timeout(settings.acquire_timeout);
            if let Some(base) = &settings.base_url {
                http = http.with_base_url(base);
            }
            Arc::new(http)
        }
    };

    Ok(VendorPipeline::new(
        settings.acquisition_policy(),
        &settings.storage_root,
        Arc::new(adapter),
        transport,
        Arc::new(registry),
    ))
}

/// A configured vendor and, when enabled, its running service.
struct VendorSlot {
    name: String,
    reporter: StatusReporter,
    service: Option<VendorService>,
}

/// ReleaseKeeper application with service lifecycle management.
///
/// # Example
///
/// ```ignore
/// use releasekeeper::app::{AppConfig, ReleaseKeeperApp};
///
/// let app = ReleaseKeeperApp::start(config).await?;
///
/// for (vendor, status) in app.statuses() {
///     println!("{}: {}", vendor, status.state);
/// }
///
/// app.shutdown().await;
/// ```
pub struct ReleaseKeeperApp {
    vendors: Vec<VendorSlot>,
}

impl ReleaseKeeperApp {
    /// Start a service for every enabled vendor.
    ///
    /// Must be called inside a tokio runtime. If any vendor fails to start,
    /// the services already started are shut down again.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        let mut app = Self {
            vendors: Vec::with_capacity(config.vendors.len()),
        };

        for settings in &config.vendors {
            if !settings.enabled {
                info!(vendor = %settings.name, "Vendor disabled");
                app.vendors.push(VendorSlot {
                    name: settings.name.clone(),
                    reporter: StatusReporter::disabled(),
                    service: None,
                });
                continue;
            }

            let pipeline = match build_pipeline(&config, settings) {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    app.shutdown().await;
                    return Err(e);
                }
            };
            let reporter = pipeline.reporter().clone();
            let service = VendorService::spawn(pipeline, settings.schedule);
            app.vendors.push(VendorSlot {
                name: settings.name.clone(),
                reporter,
                service: Some(service),
            });
        }

        info!(
            vendors = app.vendors.len(),
            running = app.vendors.iter().filter(|v| v.service.is_some()).count(),
            "ReleaseKeeper started"
        );
        Ok(app)
    }

    /// Status of every configured vendor, in configuration order.
    pub fn statuses(&self) -> Vec<(String, StatusSnapshot)> {
        self.vendors
            .iter()
            .map(|v| (v.name.clone(), v.reporter.snapshot()))
            .collect()
    }

    /// Control handle of a running vendor.
    pub fn handle(&self, vendor: &str) -> Option<VendorHandle> {
        self.vendors
            .iter()
            .find(|v| v.name == vendor)
            .and_then(|v| v.service.as_ref())
            .map(VendorService::handle)
    }

    pub fn handles(&self) -> Vec<VendorHandle> {
        self.vendors
            .iter()
            .filter_map(|v| v.service.as_ref().map(VendorService::handle))
            .collect()
    }

    /// Cancel every running pass without stopping the services.
    pub fn cancel_all_passes(&self) {
        for handle in self.handles() {
            handle.cancel_pass();
        }
    }

    /// Stop every service and wait for them to finish.
    ///
    /// All services are signalled before any is awaited, so running passes
    /// stop together.
    pub async fn shutdown(self) {
        info!("Shutting down ReleaseKeeper");
        for handle in self.handles() {
            handle.request_shutdown();
        }
        for slot in self.vendors {
            if let Some(service) = slot.service {
                service.shutdown().await;
            }
        }
    }
}
