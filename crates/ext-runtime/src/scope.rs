//! Per-extension symbol and resource lookup.
//!
//! A [`ResolutionScope`] answers "where does this name come from" for one
//! extension. Lookups try, in order:
//!
//! 1. the extension's own archive
//! 2. the shared core scope
//! 3. each declared dependency's scope, in declaration order, recursively
//!
//! Nested dependency scopes search their own archive and their dependencies
//! but not the core again. Scopes are built after the initialization order is
//! known and hold their dependencies by `Arc`, so a scope can only point at
//! scopes built before it and the graph is acyclic by construction. Once
//! built a scope is immutable and safe to query from any thread.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::archive::{ArchiveIndex, symbol_to_resource};
use crate::descriptor::ExtensionDescriptor;

/// Whether a lookup may fall back to dependency scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Full,
    /// Only the owning archive and the core are searched.
    LocalOnly,
}

/// Where a resolved name was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Provider {
    Extension(String),
    Core,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extension(id) => f.write_str(id),
            Self::Core => f.write_str("<core>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub provider: Provider,
    pub path: PathBuf,
}

pub struct ResolutionScope {
    owner: String,
    archive: ArchiveIndex,
    core: Arc<ArchiveIndex>,
    dependencies: Vec<Arc<ResolutionScope>>,
}

impl ResolutionScope {
    pub fn new(
        owner: impl Into<String>,
        archive: ArchiveIndex,
        core: Arc<ArchiveIndex>,
        dependencies: Vec<Arc<ResolutionScope>>,
    ) -> Self {
        Self {
            owner: owner.into(),
            archive,
            core,
            dependencies,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn archive(&self) -> &ArchiveIndex {
        &self.archive
    }

    pub fn dependencies(&self) -> &[Arc<ResolutionScope>] {
        &self.dependencies
    }

    /// Resolve an archive-relative resource name.
    pub fn resolve_resource(&self, name: &str, visibility: Visibility) -> Option<Location> {
        if let Some(found) = self.find_local(name) {
            return Some(found);
        }
        if let Some(path) = self.core.locate(name) {
            return Some(Location {
                provider: Provider::Core,
                path,
            });
        }
        if visibility == Visibility::LocalOnly {
            return None;
        }

        let mut visited = HashSet::from([self.owner.as_str()]);
        self.dependencies
            .iter()
            .find_map(|dep| dep.find_transitive(name, &mut visited))
    }

    /// Resolve a dotted symbol name such as `com.acme.text.TextInit`.
    pub fn resolve_symbol(&self, symbol: &str, visibility: Visibility) -> Option<Location> {
        self.resolve_resource(&symbol_to_resource(symbol), visibility)
    }

    fn find_local(&self, name: &str) -> Option<Location> {
        self.archive.locate(name).map(|path| Location {
            provider: Provider::Extension(self.owner.clone()),
            path,
        })
    }

    fn find_transitive<'a>(&'a self, name: &str, visited: &mut HashSet<&'a str>) -> Option<Location> {
        if !visited.insert(self.owner.as_str()) {
            return None;
        }
        if let Some(found) = self.find_local(name) {
            return Some(found);
        }
        self.dependencies
            .iter()
            .find_map(|dep| dep.find_transitive(name, visited))
    }
}

impl fmt::Debug for ResolutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<&str> = self.dependencies.iter().map(|d| d.owner()).collect();
        f.debug_struct("ResolutionScope")
            .field("owner", &self.owner)
            .field("entries", &self.archive.len())
            .field("dependencies", &deps)
            .finish()
    }
}

/// All built scopes, keyed by extension identity.
#[derive(Debug, Default)]
pub struct ScopeTable {
    core: Arc<ArchiveIndex>,
    scopes: BTreeMap<String, Arc<ResolutionScope>>,
}

impl ScopeTable {
    pub fn new(core: ArchiveIndex) -> Self {
        Self {
            core: Arc::new(core),
            scopes: BTreeMap::new(),
        }
    }

    pub fn core(&self) -> &ArchiveIndex {
        &self.core
    }

    /// Build and store the scope of `descriptor`.
    ///
    /// Dependencies must already have scopes, which holds when descriptors
    /// are wired in initialization order. Returns the identity of the first
    /// dependency without a scope otherwise.
    pub fn build(&mut self, descriptor: &ExtensionDescriptor) -> Result<Arc<ResolutionScope>, String> {
        let dependencies = descriptor
            .dependencies()
            .iter()
            .map(|dep| self.scopes.get(&dep.id).cloned().ok_or_else(|| dep.id.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let scope = Arc::new(ResolutionScope::new(
            descriptor.id(),
            descriptor.archive().clone(),
            Arc::clone(&self.core),
            dependencies,
        ));
        self.scopes.insert(descriptor.id().to_string(), Arc::clone(&scope));
        tracing::debug!(extension = descriptor.id(), dependencies = scope.dependencies().len(), "scope wired");
        Ok(scope)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ResolutionScope>> {
        self.scopes.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<ResolutionScope>> {
        self.scopes.remove(id)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
