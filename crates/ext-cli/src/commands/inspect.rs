//! Inspect command implementation

use std::path::Path;

use colored::Colorize;
use ext_fs::NormalizedPath;
use ext_runtime::{DescriptorSummary, ExtensionDescriptor};

use crate::error::Result;

/// Run the inspect command
pub fn run_inspect(archive: &Path, json: bool) -> Result<()> {
    let descriptor = ExtensionDescriptor::load(&NormalizedPath::new(archive))?;
    let summary = DescriptorSummary::from(&descriptor);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} {}", summary.id.cyan().bold(), summary.version);
    println!();
    println!("{}:      {}", "Name".dimmed(), summary.name);
    if let Some(vendor) = &summary.vendor {
        println!("{}:    {}", "Vendor".dimmed(), vendor);
    }
    if let Some(url) = &summary.url {
        println!("{}:       {}", "URL".dimmed(), url);
    }
    println!("{}:      {}", "Host".dimmed(), format!(">= {}", summary.required_host_version));
    println!(
        "{}: {}",
        "Initializer".dimmed(),
        summary.initializer.as_deref().unwrap_or("-")
    );
    println!(
        "{}:    {}",
        "Signed".dimmed(),
        match descriptor.signature() {
            Some(signature) => signature.signer.green(),
            None => "no".yellow(),
        }
    );
    println!();

    println!("{}:", "Dependencies".bold());
    if summary.dependencies.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for dependency in &summary.dependencies {
        println!("  {} {}", "+".green(), dependency);
    }
    println!();

    println!("{}:", "Resources".bold());
    if summary.resources.is_empty() {
        println!("  {}", "None".dimmed());
    }
    for handle in &summary.resources {
        let present = descriptor.archive().contains(&handle.resource_path());
        let marker = if present { "+".green() } else { "?".yellow() };
        println!("  {} {} {}", marker, handle.kind.as_str(), handle.name);
    }
    Ok(())
}
