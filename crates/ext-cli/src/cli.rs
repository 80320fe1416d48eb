//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// exthost - Resolve and inspect extension archives
#[derive(Parser, Debug)]
#[command(name = "exthost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command that builds a runtime.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeArgs {
    /// Settings file (TOML, JSON or YAML)
    #[arg(short, long, env = "EXTHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional directory to scan for `.ext` archives
    #[arg(short, long)]
    pub scan: Vec<PathBuf>,

    /// Admin whitelist string, e.g. "shipped, rmx_extra" or "none"
    #[arg(long)]
    pub whitelist: Option<String>,

    /// Version of the running host
    #[arg(long)]
    pub host_version: Option<String>,

    /// Skip GUI initialization hooks
    #[arg(long)]
    pub headless: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Resolve every discovered extension and print the report
    ///
    /// Examples:
    ///   exthost resolve --scan ./extensions
    ///   exthost resolve --config host.toml --json
    Resolve {
        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the manifest of one archive
    Inspect {
        /// Path to the `.ext` archive directory
        archive: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Resolve a name in the scope of an active extension
    Lookup {
        /// Extension identity
        id: String,

        /// Resource path, or dotted symbol with --symbol
        name: String,

        /// Treat NAME as a dotted symbol
        #[arg(long)]
        symbol: bool,

        /// Search only the extension's own archive and the core
        #[arg(long)]
        local_only: bool,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Manage user-installed extensions
    Managed {
        /// Managed store root
        #[arg(short, long)]
        root: PathBuf,

        #[command(subcommand)]
        action: ManagedAction,
    },
}

/// Managed store actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ManagedAction {
    /// List installed extensions
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Select the installed version loaded at startup
    Select { id: String, version: String },

    /// Load the extension at startup
    Enable { id: String },

    /// Keep the extension installed but do not load it
    Disable { id: String },

    /// Forget one installed version
    Remove { id: String, version: String },
}
