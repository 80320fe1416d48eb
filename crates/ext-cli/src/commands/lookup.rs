//! Lookup command implementation

use colored::Colorize;
use ext_runtime::Visibility;

use crate::cli::RuntimeArgs;
use crate::error::{CliError, Result};

/// Run the lookup command
///
/// Starts a runtime, then resolves `name` in the scope of `id`. A name that
/// does not resolve is an error so scripts can test the exit code.
pub fn run_lookup(args: &RuntimeArgs, id: &str, name: &str, symbol: bool, local_only: bool) -> Result<()> {
    let (runtime, _report) = super::start_runtime(args)?;
    let visibility = if local_only {
        Visibility::LocalOnly
    } else {
        Visibility::Full
    };

    match runtime.lookup(id, name, symbol, visibility)? {
        Some(location) => {
            println!("{} {}", location.provider.to_string().cyan(), location.path.display());
            Ok(())
        }
        None => Err(CliError::user(format!("'{name}' is not visible from {id}"))),
    }
}
