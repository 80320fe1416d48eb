use std::path::PathBuf;

/// Errors that can occur in the extension runtime.
///
/// Per-extension resolution failures are not errors: they are recorded as
/// [`IncompatibleReason`](crate::registry::IncompatibleReason) values and the
/// pipeline keeps going.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Extension manifest is malformed or lacks a required attribute.
    #[error("invalid manifest at {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// Extension manifest file not found inside the archive.
    #[error("extension manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Invalid version string.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Malformed `Plugin-Dependencies` token.
    #[error("invalid dependency '{token}': {reason}")]
    InvalidDependency { token: String, reason: String },

    /// Malformed blacklist entry.
    #[error("invalid blacklist entry '{entry}': {reason}")]
    InvalidBlacklist { entry: String, reason: String },

    /// Extension not found in the registry or managed store.
    #[error("unknown extension: {0}")]
    UnknownExtension(String),

    /// Requested version is not installed in the managed store.
    #[error("version {version} of '{id}' is not installed")]
    VersionNotInstalled { id: String, version: String },

    /// `start` was called on a runtime that already ran.
    #[error("extension runtime already started")]
    AlreadyStarted,

    /// Filesystem layer error.
    #[error(transparent)]
    Fs(#[from] ext_fs::Error),

    /// I/O error reading archive contents.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
