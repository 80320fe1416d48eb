//! Managed store commands

use std::path::Path;

use colored::Colorize;
use ext_runtime::{ManagedStore, VersionNumber};

use crate::error::Result;

/// List installed extensions
pub fn run_managed_list(root: &Path, json: bool) -> Result<()> {
    let store = ManagedStore::open(root)?;
    let entries: Vec<_> = store.entries().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", "Managed Extensions".bold());
    if entries.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for entry in entries {
        let state = if entry.active {
            "active".green()
        } else {
            "inactive".yellow()
        };
        let installed: Vec<String> = entry.installed_versions.iter().map(ToString::to_string).collect();
        println!(
            "  {} {} ({}) [{}]",
            entry.id.cyan(),
            entry.selected_version,
            state,
            installed.join(", ").dimmed()
        );
    }
    Ok(())
}

/// Select the installed version loaded at startup
pub fn run_managed_select(root: &Path, id: &str, version: &str) -> Result<()> {
    let version = VersionNumber::parse(version)?;
    let mut store = ManagedStore::open(root)?;
    store.select_version(id, &version)?;
    store.save()?;
    println!("{} {} selected {}", "+".green(), id.cyan(), version);
    Ok(())
}

/// Enable or disable loading at startup
pub fn run_managed_set_active(root: &Path, id: &str, active: bool) -> Result<()> {
    let mut store = ManagedStore::open(root)?;
    store.set_active(id, active)?;
    store.save()?;
    let state = if active { "enabled" } else { "disabled" };
    println!("{} {} {}", "+".green(), id.cyan(), state);
    Ok(())
}

/// Forget one installed version
pub fn run_managed_remove(root: &Path, id: &str, version: &str) -> Result<()> {
    let version = VersionNumber::parse(version)?;
    let mut store = ManagedStore::open(root)?;
    store.remove_version(id, &version)?;
    store.save()?;
    println!("{} {} {} removed", "-".red(), id.cyan(), version);
    Ok(())
}
