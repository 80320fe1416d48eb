//! exthost
//!
//! Command-line host for the extension runtime: resolves extension archives
//! the way an embedding application would and reports what happened.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, ManagedAction};
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose).map_err(|e| CliError::user(format!("failed to set up logging: {e}")))?;
    tracing::debug!("verbose mode enabled");

    match cli.command {
        Some(cmd) => execute_command(cmd),
        None => {
            println!("{} extension host", "exthost".green().bold());
            println!();
            println!("Run {} for available commands.", "exthost --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Resolve { runtime, json } => commands::run_resolve(&runtime, json),
        Commands::Inspect { archive, json } => commands::run_inspect(&archive, json),
        Commands::Lookup {
            id,
            name,
            symbol,
            local_only,
            runtime,
        } => commands::run_lookup(&runtime, &id, &name, symbol, local_only),
        Commands::Managed { root, action } => match action {
            ManagedAction::List { json } => commands::run_managed_list(&root, json),
            ManagedAction::Select { id, version } => commands::run_managed_select(&root, &id, &version),
            ManagedAction::Enable { id } => commands::run_managed_set_active(&root, &id, true),
            ManagedAction::Disable { id } => commands::run_managed_set_active(&root, &id, false),
            ManagedAction::Remove { id, version } => commands::run_managed_remove(&root, &id, &version),
        },
    }
}
