//! `run` command: run every enabled vendor until interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use releasekeeper::app::{AppConfig, ReleaseKeeperApp};
use releasekeeper::config::ConfigFile;
use releasekeeper::status::{ModuleState, StatusSnapshot};

use crate::error::CliError;

/// How often the shutdown flag is checked.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

pub fn run(config: &ConfigFile, status_interval_secs: u64) -> Result<(), CliError> {
    if config.vendors.is_empty() {
        return Err(CliError::Config(
            "No vendors configured. Add a [vendor.<name>] section to the config file.".to_string(),
        ));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    println!("ReleaseKeeper v{}", releasekeeper::VERSION);
    println!("====================");
    println!();
    println!("Registry: {}", config.general.data_dir.display());
    for vendor in &config.vendors {
        println!("  {:<12} {}", vendor.name, vendor.schedule);
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let app_config = AppConfig::from_config_file(config);
    let interval = Duration::from_secs(status_interval_secs.max(1));

    let runtime = super::runtime()?;
    runtime.block_on(async {
        let app = ReleaseKeeperApp::start(app_config).await?;
        print_statuses(&app.statuses());

        let mut last_report = Instant::now();
        while !shutdown.load(Ordering::SeqCst) {
            tokio::time::sleep(SHUTDOWN_POLL).await;
            if last_report.elapsed() >= interval {
                print_statuses(&app.statuses());
                last_report = Instant::now();
            }
        }

        println!();
        println!("Received shutdown signal, stopping vendors...");
        app.cancel_all_passes();
        app.shutdown().await;
        Ok::<(), CliError>(())
    })?;

    println!("All vendors stopped.");
    Ok(())
}

fn print_statuses(statuses: &[(String, StatusSnapshot)]) {
    for (vendor, status) in statuses {
        println!("{}", status_line(vendor, status));
    }
}

fn status_line(vendor: &str, status: &StatusSnapshot) -> String {
    let state = match status.state {
        ModuleState::Disabled => style(status.state.to_string()).dim(),
        ModuleState::Standby => style(status.state.to_string()).cyan(),
        ModuleState::InProgress => style(status.state.to_string()).yellow(),
        ModuleState::Ready => style(status.state.to_string()).green(),
        ModuleState::Error => style(status.state.to_string()).red(),
    };

    let mut line = format!("  {:<12} {}", vendor, state);
    if status.state == ModuleState::InProgress {
        line.push_str(&format!(" {:>3}%", status.progress));
        if let Some(task) = &status.current_task {
            line.push_str(&format!(" {}", task));
        }
    } else if !status.message.is_empty() {
        line.push_str(&format!("  {}", status.message));
    }
    line
}
