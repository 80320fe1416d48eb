//! Host registries fed by the lifecycle phases.
//!
//! Phase A hands every descriptor to a [`DescriptionRegistrar`], Phase B to a
//! [`CapabilityRegistrar`]. The runtime ships one default of each:
//! [`ResourceCatalog`] records where each declared resource handle lives, and
//! [`OperatorCatalog`] reads the operator table and resolves the symbols it
//! names.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ext_fs::{NormalizedPath, io};
use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;
use crate::hooks::HostError;
use crate::manifest::{ResourceHandle, ResourceKind};
use crate::scope::{Location, Provider, ResolutionScope, Visibility};

/// Receives the declared resource handles of each extension (Phase A).
///
/// An error excises the extension.
pub trait DescriptionRegistrar: Send {
    fn register_descriptions(
        &mut self,
        descriptor: &ExtensionDescriptor,
        scope: &ResolutionScope,
    ) -> Result<(), HostError>;

    /// Withdraw everything registered for `id`.
    fn unregister(&mut self, id: &str);

    /// Names registered for `id`.
    fn registered(&self, id: &str) -> Vec<String>;
}

/// Receives the externally visible units of each extension (Phase B).
///
/// An error is reported but does not excise the extension.
pub trait CapabilityRegistrar: Send {
    fn register_capabilities(
        &mut self,
        descriptor: &ExtensionDescriptor,
        scope: &ResolutionScope,
    ) -> Result<(), HostError>;

    fn unregister(&mut self, id: &str);

    fn registered(&self, id: &str) -> Vec<String>;
}

/// A resource handle together with the file it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredResource {
    pub handle: ResourceHandle,
    pub path: PathBuf,
}

/// Default description registrar.
///
/// Each handle is resolved local-only, so an extension cannot satisfy its own
/// declarations with a dependency's file.
#[derive(Debug, Default)]
pub struct ResourceCatalog {
    resources: BTreeMap<String, Vec<RegisteredResource>>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resources(&self, id: &str) -> &[RegisteredResource] {
        self.resources.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// All registered resources of one kind, across extensions.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&str, &RegisteredResource)> {
        self.resources.iter().flat_map(move |(id, list)| {
            list.iter()
                .filter(move |r| r.handle.kind == kind)
                .map(move |r| (id.as_str(), r))
        })
    }
}

impl DescriptionRegistrar for ResourceCatalog {
    fn register_descriptions(
        &mut self,
        descriptor: &ExtensionDescriptor,
        scope: &ResolutionScope,
    ) -> Result<(), HostError> {
        let mut registered = Vec::with_capacity(descriptor.resources().len());
        for handle in descriptor.resources() {
            let resource = handle.resource_path();
            let location = scope
                .resolve_resource(&resource, Visibility::LocalOnly)
                .ok_or_else(|| format!("{} resource '{}' not found ({resource})", handle.kind, handle.name))?;
            registered.push(RegisteredResource {
                handle: handle.clone(),
                path: location.path,
            });
        }
        tracing::debug!(extension = descriptor.id(), count = registered.len(), "descriptions registered");
        self.resources.insert(descriptor.id().to_string(), registered);
        Ok(())
    }

    fn unregister(&mut self, id: &str) {
        self.resources.remove(id);
    }

    fn registered(&self, id: &str) -> Vec<String> {
        self.resources(id).iter().map(|r| r.handle.name.clone()).collect()
    }
}

/// An operator key bound to the unit that implements it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredOperator {
    pub key: String,
    pub symbol: String,
    pub owner: String,
    pub provider: Provider,
    pub path: PathBuf,
}

/// Default capability registrar.
///
/// The `Operators` resource is a line table:
///
/// ```text
/// # key = symbol
/// text:tokenize = com.acme.text.Tokenize
/// ```
///
/// Keys are global across extensions; the first registration wins.
#[derive(Debug, Default)]
pub struct OperatorCatalog {
    operators: BTreeMap<String, RegisteredOperator>,
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&RegisteredOperator> {
        self.operators.get(key)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Parse an operator table into `(key, symbol)` pairs.
pub fn parse_operator_table(content: &str) -> Result<Vec<(String, String)>, String> {
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, symbol) = line
            .split_once('=')
            .map(|(k, s)| (k.trim(), s.trim()))
            .filter(|(k, s)| !k.is_empty() && !s.is_empty())
            .ok_or_else(|| format!("line {}: expected 'key = symbol'", index + 1))?;
        entries.push((key.to_string(), symbol.to_string()));
    }
    Ok(entries)
}

impl CapabilityRegistrar for OperatorCatalog {
    fn register_capabilities(
        &mut self,
        descriptor: &ExtensionDescriptor,
        scope: &ResolutionScope,
    ) -> Result<(), HostError> {
        let Some(handle) = descriptor
            .resources()
            .iter()
            .find(|h| h.kind == ResourceKind::Operators)
        else {
            return Ok(());
        };

        let Location { path, .. } = scope
            .resolve_resource(&handle.resource_path(), Visibility::LocalOnly)
            .ok_or_else(|| format!("operator table '{}' not found", handle.name))?;
        let content = io::read_text(&NormalizedPath::new(&path))
            .map_err(|e| format!("cannot read operator table: {e}"))?;
        let entries = parse_operator_table(&content)?;

        let mut problems = Vec::new();
        for (key, symbol) in entries {
            if let Some(existing) = self.operators.get(&key) {
                problems.push(format!("operator '{key}' already registered by {}", existing.owner));
                continue;
            }
            match scope.resolve_symbol(&symbol, Visibility::Full) {
                Some(location) => {
                    self.operators.insert(
                        key.clone(),
                        RegisteredOperator {
                            key,
                            symbol,
                            owner: descriptor.id().to_string(),
                            provider: location.provider,
                            path: location.path,
                        },
                    );
                }
                None => problems.push(format!("operator '{key}': unit {symbol} not found")),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; ").into())
        }
    }

    fn unregister(&mut self, id: &str) {
        self.operators.retain(|_, op| op.owner != id);
    }

    fn registered(&self, id: &str) -> Vec<String> {
        self.operators
            .values()
            .filter(|op| op.owner == id)
            .map(|op| op.key.clone())
            .collect()
    }
}
