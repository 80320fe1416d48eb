//! Resolve command implementation

use colored::Colorize;
use ext_runtime::conflict::ConflictReason;
use ext_runtime::{ExtensionRuntime, ResolutionReport};

use crate::cli::RuntimeArgs;
use crate::error::Result;

/// Run the resolve command
pub fn run_resolve(args: &RuntimeArgs, json: bool) -> Result<()> {
    let (runtime, report) = super::start_runtime(args)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&runtime, &report);
    }
    Ok(())
}

fn print_report(runtime: &ExtensionRuntime, report: &ResolutionReport) {
    println!("{}", "Active Extensions".bold());
    if runtime.registry().is_empty() {
        println!("  {}", "None".dimmed());
    }
    for (position, descriptor) in runtime.registry().initialization_order().enumerate() {
        println!(
            "  {:>3}. {} {} {}",
            position + 1,
            descriptor.id().cyan(),
            descriptor.version(),
            format!("({})", descriptor.name()).dimmed()
        );
    }

    if !report.conflicts.is_empty() {
        println!();
        println!("{}", "Conflicts".bold());
        for conflict in &report.conflicts {
            println!(
                "  {} {}: kept {}, dropped {} ({})",
                "~".yellow(),
                conflict.id.cyan(),
                conflict.kept,
                conflict.dropped,
                describe_conflict(conflict.reason)
            );
        }
    }

    if !report.incompatible.is_empty() {
        println!();
        println!("{}", "Incompatible".bold());
        for incompatible in &report.incompatible {
            println!(
                "  {} {} {}: {}",
                "x".red(),
                incompatible.id.cyan(),
                incompatible.version,
                incompatible.reason
            );
        }
    }

    if !report.capability_failures.is_empty() {
        println!();
        println!("{}", "Capability Failures".bold());
        for failure in &report.capability_failures {
            println!("  {} {}: {}", "!".yellow(), failure.id.cyan(), failure.message);
        }
    }

    if !report.rejected.is_empty() {
        println!();
        println!("{}", "Unreadable Archives".bold());
        for rejected in &report.rejected {
            println!("  {} {}: {}", "x".red(), rejected.path, rejected.error);
        }
    }
}

fn describe_conflict(reason: ConflictReason) -> &'static str {
    match reason {
        ConflictReason::HigherVersion => "higher version",
        ConflictReason::HigherVersionRejected => "higher version refused by policy",
        ConflictReason::EqualVersion => "equal version, first seen wins",
        ConflictReason::AlreadyActive => "already active",
    }
}
