//! Discovery of extension archives on disk.

use std::sync::Arc;

use ext_fs::NormalizedPath;
use serde::Serialize;
use walkdir::WalkDir;

use crate::archive::is_archive_path;
use crate::descriptor::ExtensionDescriptor;

/// An archive that could not be turned into a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedArchive {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub descriptors: Vec<Arc<ExtensionDescriptor>>,
    pub rejected: Vec<RejectedArchive>,
}

impl Discovery {
    pub fn extend(&mut self, other: Discovery) {
        self.descriptors.extend(other.descriptors);
        self.rejected.extend(other.rejected);
    }
}

/// Archive directories directly below `root`, sorted by name.
pub fn list_archives(root: &NormalizedPath) -> Vec<NormalizedPath> {
    let native = root.to_native();
    if !native.is_dir() {
        tracing::debug!(root = %root, "skipping missing scan root");
        return Vec::new();
    }

    WalkDir::new(&native)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(root = %root, "skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| NormalizedPath::new(entry.path()))
        .filter(is_archive_path)
        .collect()
}

/// Load descriptors from explicit archive paths, in the given order.
pub fn load_archives(paths: &[NormalizedPath]) -> Discovery {
    let mut discovery = Discovery::default();
    for path in paths {
        match ExtensionDescriptor::load(path) {
            Ok(descriptor) => {
                tracing::debug!(extension = descriptor.id(), version = %descriptor.version(), archive = %path, "discovered");
                discovery.descriptors.push(Arc::new(descriptor));
            }
            Err(e) => {
                tracing::warn!(archive = %path, "rejected archive: {e}");
                discovery.rejected.push(RejectedArchive {
                    path: path.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    discovery
}

/// Scan every root in order. Missing roots are skipped.
pub fn discover(roots: &[NormalizedPath]) -> Discovery {
    let archives: Vec<NormalizedPath> = roots.iter().flat_map(list_archives).collect();
    let discovery = load_archives(&archives);
    tracing::info!(
        roots = roots.len(),
        found = discovery.descriptors.len(),
        rejected = discovery.rejected.len(),
        "extension scan complete"
    );
    discovery
}
