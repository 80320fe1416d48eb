//! Content index of an extension archive.
//!
//! An archive is a directory ending in `.ext`. Its files are indexed once,
//! when the archive is loaded, so lookups never touch the filesystem.

use std::collections::BTreeSet;
use std::path::PathBuf;

use ext_fs::{NormalizedPath, normalize_resource_name};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File name suffix that marks a directory as an extension archive.
pub const ARCHIVE_SUFFIX: &str = ".ext";

/// File suffix of a symbol (unit) inside an archive.
pub const SYMBOL_SUFFIX: &str = ".unit";

/// Map a dotted symbol name to its archive-relative resource path.
///
/// `com.acme.text.TextInit` becomes `com/acme/text/TextInit.unit`.
pub fn symbol_to_resource(symbol: &str) -> String {
    format!("{}{}", symbol.trim().replace('.', "/"), SYMBOL_SUFFIX)
}

/// Whether a path names an extension archive.
pub fn is_archive_path(path: &NormalizedPath) -> bool {
    path.file_name()
        .is_some_and(|name| name.len() > ARCHIVE_SUFFIX.len() && name.ends_with(ARCHIVE_SUFFIX))
}

/// The set of resources available in one archive (or in the core scope).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveIndex {
    root: NormalizedPath,
    entries: BTreeSet<String>,
}

impl ArchiveIndex {
    /// Index every regular file below `root`.
    pub fn scan(root: &NormalizedPath) -> Result<Self> {
        let native = root.to_native();
        if !native.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("archive directory not found: {root}"),
            )));
        }

        let mut entries = BTreeSet::new();
        for entry in WalkDir::new(&native).follow_links(false) {
            let entry = entry.map_err(|e| {
                Error::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk loop detected")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = NormalizedPath::new(entry.path())
                .relative_to(root)
                .filter(|rel| !rel.is_empty());
            if let Some(rel) = relative {
                entries.insert(rel);
            }
        }

        tracing::debug!(archive = %root, entries = entries.len(), "indexed archive");
        Ok(Self {
            root: root.clone(),
            entries,
        })
    }

    /// Build an index from known entries without touching the filesystem.
    pub fn from_entries<I, S>(root: impl Into<NormalizedPath>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: root.into(),
            entries: entries
                .into_iter()
                .map(|e| normalize_resource_name(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    /// Whether the archive contains `resource`.
    pub fn contains(&self, resource: &str) -> bool {
        self.entries.contains(&normalize_resource_name(resource))
    }

    /// Absolute location of `resource`, if the archive contains it.
    pub fn locate(&self, resource: &str) -> Option<PathBuf> {
        let name = normalize_resource_name(resource);
        self.entries
            .contains(&name)
            .then(|| self.root.join(&name).to_native())
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
