//! `pass` command: run one pass for one vendor in the foreground.

use console::style;
use releasekeeper::app::{build_pipeline, AppConfig, AppError};
use releasekeeper::config::ConfigFile;
use releasekeeper::pipeline::PassReport;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

pub fn run(config: &ConfigFile, vendor: &str) -> Result<(), CliError> {
    let app_config = AppConfig::from_config_file(config);
    let settings = app_config
        .vendor(vendor)
        .ok_or_else(|| AppError::UnknownVendor(vendor.to_string()))?;
    if !settings.enabled {
        println!(
            "{} vendor '{}' is disabled; running anyway",
            style("note:").yellow(),
            vendor
        );
    }

    let pipeline = build_pipeline(&app_config, settings)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        signal_cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    println!("ReleaseKeeper v{}", releasekeeper::VERSION);
    println!("Running pass for '{}' (Ctrl+C to cancel)", vendor);
    println!();

    let runtime = super::runtime()?;
    let report = runtime.block_on(pipeline.run_pass(&cancel))?;
    info!(vendor, summary = %report.summary(), "Manual pass finished");

    print_report(&report);
    Ok(())
}

fn print_report(report: &PassReport) {
    let headline = if report.cancelled {
        style("Pass cancelled").yellow()
    } else {
        style("Pass complete").green()
    };
    println!("{}", headline);
    println!("───────────────");
    println!("  Discovered:       {}", report.discovered);
    println!("  New artifacts:    {}", report.reconcile.inserted.len());
    println!("  Already on disk:  {}", report.reconcile.already_on_disk);
    println!("  Acquired:         {}", report.acquisition.completed.len());
    println!("  Failed:           {}", report.acquisition.failed.len());
    for (key, reason) in &report.acquisition.failed {
        println!("  {} {}: {}", style("failed").red(), key, reason);
    }
    for key in &report.readiness.newly_ready {
        println!("  {} {}", style("ready").green().bold(), key);
    }
    for (key, reason) in &report.readiness.waiting {
        println!("  {} {}: {}", style("waiting").dim(), key, reason);
    }
}
