//! Command implementations for ext-cli

pub mod inspect;
pub mod lookup;
pub mod managed;
pub mod resolve;

pub use inspect::run_inspect;
pub use lookup::run_lookup;
pub use managed::{run_managed_list, run_managed_remove, run_managed_select, run_managed_set_active};
pub use resolve::run_resolve;

use ext_fs::NormalizedPath;
use ext_runtime::{ExtensionRuntime, RuntimeSettings, VersionNumber};

use crate::cli::RuntimeArgs;
use crate::error::Result;

/// Settings from `--config` (if any) with the command-line overrides applied.
pub(crate) fn load_settings(args: &RuntimeArgs) -> Result<RuntimeSettings> {
    let mut settings = match &args.config {
        Some(path) => RuntimeSettings::load(&NormalizedPath::new(path))?,
        None => RuntimeSettings::default(),
    };
    if let Some(home) = dirs::home_dir() {
        settings.expand_home(&home);
    }

    settings
        .scan
        .extend(args.scan.iter().map(|dir| dir.to_string_lossy().into_owned()));
    if let Some(whitelist) = &args.whitelist {
        settings.whitelist = Some(whitelist.clone());
    }
    if let Some(version) = &args.host_version {
        settings.host_version = Some(VersionNumber::parse(version)?);
    }
    settings.headless |= args.headless;
    Ok(settings)
}

/// Build a runtime from the arguments and run startup resolution.
pub(crate) fn start_runtime(args: &RuntimeArgs) -> Result<(ExtensionRuntime, ext_runtime::ResolutionReport)> {
    let settings = load_settings(args)?;
    tracing::debug!(scan = ?settings.scan, managed = ?settings.managed_root, "starting runtime");
    let mut runtime = ExtensionRuntime::from_settings(&settings)?;
    let report = runtime.start()?;
    Ok((runtime, report))
}
