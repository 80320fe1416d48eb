//! Filesystem abstraction for the extension runtime
//!
//! Provides normalized path handling, locked atomic writes, format-agnostic
//! configuration loading and content checksums.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use path::{NormalizedPath, normalize_resource_name};
