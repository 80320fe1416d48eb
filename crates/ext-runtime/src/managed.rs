//! User-installed extensions and their selected versions.
//!
//! ```text
//! <root>/
//!   managed.toml                 record of installed and selected versions
//!   managed/
//!     rmx_text-1.2.0.ext/
//!     rmx_text-1.3.0.ext/
//! ```
//!
//! The record is the authority on which installed version is selected.

use std::collections::BTreeMap;

use ext_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};

use crate::archive::ARCHIVE_SUFFIX;
use crate::error::{Error, Result};
use crate::version::VersionNumber;

pub const RECORD_FILE: &str = "managed.toml";
pub const ARCHIVE_DIR: &str = "managed";

/// Persisted state of one managed extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedExtension {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub active: bool,
    pub selected_version: VersionNumber,
    /// Sorted ascending.
    pub installed_versions: Vec<VersionNumber>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ManagedRecord {
    #[serde(default, rename = "extension")]
    extensions: Vec<ManagedExtension>,
}

/// The managed extension store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ManagedStore {
    root: NormalizedPath,
    entries: BTreeMap<String, ManagedExtension>,
}

impl ManagedStore {
    /// Open the store at `root`, loading its record if present.
    pub fn open(root: impl Into<NormalizedPath>) -> Result<Self> {
        let mut store = Self {
            root: root.into(),
            entries: BTreeMap::new(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn record_path(&self) -> NormalizedPath {
        self.root.join(RECORD_FILE)
    }

    /// Directory of the archive for `id` at `version`.
    pub fn archive_path(&self, id: &str, version: &VersionNumber) -> NormalizedPath {
        self.root
            .join(ARCHIVE_DIR)
            .join(&format!("{id}-{version}{ARCHIVE_SUFFIX}"))
    }

    /// Reload the record from disk. A missing record means an empty store.
    pub fn load(&mut self) -> Result<()> {
        let record: ManagedRecord = ConfigStore::new().load_or_default(&self.record_path())?;
        self.entries = record
            .extensions
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();
        tracing::debug!(root = %self.root, entries = self.entries.len(), "managed record loaded");
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let record = ManagedRecord {
            extensions: self.entries.values().cloned().collect(),
        };
        ConfigStore::new().save(&self.record_path(), &record)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ManagedExtension> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ManagedExtension> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record that `version` of `id` was installed and select it.
    pub fn record_install(
        &mut self,
        id: &str,
        name: &str,
        license: Option<&str>,
        version: VersionNumber,
    ) {
        let entry = self.entries.entry(id.to_string()).or_insert_with(|| ManagedExtension {
            id: id.to_string(),
            name: name.to_string(),
            license: None,
            active: true,
            selected_version: version.clone(),
            installed_versions: Vec::new(),
        });
        entry.name = name.to_string();
        if let Some(license) = license {
            entry.license = Some(license.to_string());
        }
        if let Err(position) = entry.installed_versions.binary_search(&version) {
            entry.installed_versions.insert(position, version.clone());
        }
        entry.selected_version = version;
        tracing::info!(extension = id, version = %entry.selected_version, "managed extension installed");
    }

    /// Select an already installed version.
    pub fn select_version(&mut self, id: &str, version: &VersionNumber) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.installed_versions.binary_search(version).is_err() {
            return Err(Error::VersionNotInstalled {
                id: id.to_string(),
                version: version.to_string(),
            });
        }
        entry.selected_version = version.clone();
        Ok(())
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Result<()> {
        self.entry_mut(id)?.active = active;
        Ok(())
    }

    /// Forget an installed version.
    ///
    /// Removing the selected version selects the newest remaining one;
    /// removing the last version drops the entry.
    pub fn remove_version(&mut self, id: &str, version: &VersionNumber) -> Result<()> {
        let entry = self.entry_mut(id)?;
        let position = entry
            .installed_versions
            .binary_search(version)
            .map_err(|_| Error::VersionNotInstalled {
                id: id.to_string(),
                version: version.to_string(),
            })?;
        entry.installed_versions.remove(position);

        match entry.installed_versions.last().cloned() {
            None => {
                self.entries.remove(id);
            }
            Some(newest) => {
                if &entry.selected_version == version {
                    entry.selected_version = newest;
                }
            }
        }
        Ok(())
    }

    /// Archives of active entries at their selected versions.
    pub fn archives_to_load(&self) -> Vec<NormalizedPath> {
        self.entries
            .values()
            .filter(|entry| entry.active)
            .map(|entry| self.archive_path(&entry.id, &entry.selected_version))
            .collect()
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut ManagedExtension> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))
    }
}
