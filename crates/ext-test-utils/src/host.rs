//! [`TestHost`] builder for runtime scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::archive::ArchiveBuilder;

/// A temporary host directory:
///
/// ```text
/// <root>/
///   extensions/     scan root
///   managed/        managed store root
///   settings.toml   written by `write_settings`
/// ```
pub struct TestHost {
    temp_dir: TempDir,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap_or_else(|e| panic!("TestHost: failed to create temp dir: {e}"));
        fs::create_dir_all(temp_dir.path().join("extensions"))
            .unwrap_or_else(|e| panic!("TestHost: failed to create scan root: {e}"));
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn scan_dir(&self) -> PathBuf {
        self.root().join("extensions")
    }

    pub fn managed_root(&self) -> PathBuf {
        self.root().join("managed")
    }

    /// Write an archive into the scan root.
    pub fn add(&self, archive: ArchiveBuilder) -> PathBuf {
        archive.write_to(&self.scan_dir())
    }

    /// Write an archive into the scan root under a custom directory name.
    pub fn add_as(&self, archive: ArchiveBuilder, name: &str) -> PathBuf {
        archive.write_as(&self.scan_dir(), name)
    }

    /// Write an archive somewhere outside the scan root, for runtime
    /// registration.
    pub fn stage(&self, archive: ArchiveBuilder) -> PathBuf {
        let staging = self.root().join("staging");
        fs::create_dir_all(&staging).unwrap_or_else(|e| panic!("TestHost: failed to create staging: {e}"));
        archive.write_to(&staging)
    }

    /// Install an archive into the managed store layout. The record file is
    /// left to the caller.
    pub fn add_managed(&self, archive: ArchiveBuilder) -> PathBuf {
        let dir = self.managed_root().join("managed");
        fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("TestHost: failed to create managed dir: {e}"));
        archive.write_to(&dir)
    }

    /// Write `settings.toml`. The scan root line is prepended.
    pub fn write_settings(&self, body: &str) -> PathBuf {
        let path = self.root().join("settings.toml");
        let content = format!("scan = [{:?}]\n{body}", self.scan_dir().display().to_string());
        fs::write(&path, content).unwrap_or_else(|e| panic!("TestHost: failed to write settings: {e}"));
        path
    }

    /// Assert that `path` (relative to the host root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(full_path.exists(), "Expected file to exist: {}", full_path.display());
    }
}
