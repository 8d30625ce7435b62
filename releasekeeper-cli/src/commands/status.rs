//! `status` command: print the bundles recorded in each vendor registry.

use console::style;
use releasekeeper::app::AppError;
use releasekeeper::config::{ConfigFile, VendorSettings};
use releasekeeper::model::Bundle;
use releasekeeper::registry::{JsonFileRegistry, Registry, RegistryState};

use crate::error::CliError;

pub fn run(config: &ConfigFile, only: Option<&str>) -> Result<(), CliError> {
    let vendors: Vec<&VendorSettings> = match only {
        Some(name) => vec![config
            .vendor(name)
            .ok_or_else(|| AppError::UnknownVendor(name.to_string()))?],
        None => config.vendors.iter().collect(),
    };

    if vendors.is_empty() {
        println!("No vendors configured.");
        return Ok(());
    }

    for (i, vendor) in vendors.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let header = if vendor.enabled {
            style(format!("[{}]", vendor.name)).bold()
        } else {
            style(format!("[{}] (disabled)", vendor.name)).dim()
        };
        println!("{}", header);

        let path = config.registry_path(&vendor.name);
        if !path.exists() {
            println!("  (no registry yet)");
            continue;
        }

        let state = JsonFileRegistry::open(&path, &vendor.name)?.snapshot()?;
        for line in describe(&state) {
            println!("{}", line);
        }
    }
    Ok(())
}

/// One line per bundle, newest period first, plus a totals line.
fn describe(state: &RegistryState) -> Vec<String> {
    let mut bundles: Vec<&Bundle> = state.bundles().collect();
    bundles.sort_by_key(|b| std::cmp::Reverse(b.key()));

    let mut lines: Vec<String> = bundles.iter().map(|b| bundle_line(state, b)).collect();
    lines.push(format!(
        "  {} artifacts, {} pending, {} bundles",
        state.artifact_count(),
        state.pending().len(),
        state.bundle_count()
    ));
    lines
}

fn bundle_line(state: &RegistryState, bundle: &Bundle) -> String {
    let on_disk = bundle
        .members
        .iter()
        .filter(|key| state.artifact(key).is_some_and(|a| a.on_disk))
        .count();

    let readiness = match bundle.ready_at {
        Some(at) if bundle.ready => style(format!(
            "ready since {}",
            at.format("%Y-%m-%d %H:%M UTC")
        ))
        .green(),
        _ => style("waiting".to_string()).yellow(),
    };

    format!(
        "  {:<14} {}/{} on disk  {}",
        bundle.key().to_string(),
        on_disk,
        bundle.member_count(),
        readiness
    )
}
