//! Shared test fixtures for the extension runtime workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`archive`]: [`ArchiveBuilder`] lays out one `.ext` archive on disk
//! - [`host`]: [`TestHost`], a temporary host directory with a scan root,
//!   a settings file and a managed store

pub mod archive;
pub mod host;

pub use archive::ArchiveBuilder;
pub use host::TestHost;
