//! Process state of resolved extensions.
//!
//! The [`Registry`] is owned by the [`ExtensionRuntime`](crate::runtime::ExtensionRuntime)
//! and holds three collections: the active descriptors, their initialization
//! order, and every descriptor that was excised along the way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;
use crate::policy::PolicyRejection;
use crate::version::VersionNumber;

/// Why a descriptor was excised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncompatibleReason {
    #[error("rejected by policy: {rejection}")]
    PolicyRejected { rejection: PolicyRejection },

    #[error("requires host version {required}, running {host}")]
    HostTooOld {
        required: VersionNumber,
        host: VersionNumber,
    },

    #[error("requires {dependency} >= {required}, {}", describe_found(.found.as_ref()))]
    UnsatisfiedDependency {
        dependency: String,
        required: VersionNumber,
        found: Option<VersionNumber>,
    },

    #[error("dependency cycle or unresolvable dependencies among [{}]", .members.join(", "))]
    CyclicOrUnresolvable { members: Vec<String> },

    #[error("failed to register descriptions: {message}")]
    DescriptionRegistration { message: String },

    #[error("hook {hook} failed: {message}")]
    HookInvocation { hook: String, message: String },

    #[error("dependency {dependency} was excised")]
    DependencyExcised { dependency: String },

    #[error("dependency {dependency} was unregistered")]
    DependencyUnregistered { dependency: String },
}

fn describe_found(found: Option<&VersionNumber>) -> String {
    match found {
        Some(version) => format!("found {version}"),
        None => "not found".to_string(),
    }
}

/// One excised descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incompatibility {
    pub id: String,
    pub version: VersionNumber,
    pub origin: String,
    pub reason: IncompatibleReason,
}

impl Incompatibility {
    pub fn new(descriptor: &ExtensionDescriptor, reason: IncompatibleReason) -> Self {
        Self {
            id: descriptor.id().to_string(),
            version: descriptor.version().clone(),
            origin: descriptor.origin().to_string(),
            reason,
        }
    }
}

/// Active, ordered and incompatible extensions.
#[derive(Debug, Default)]
pub struct Registry {
    active: BTreeMap<String, Arc<ExtensionDescriptor>>,
    order: Vec<String>,
    incompatible: Vec<Incompatibility>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `descriptor` to the active set and the initialization order.
    ///
    /// An earlier incompatibility record for the same identity is dropped,
    /// so `active` and `incompatible` never share an identity.
    pub fn activate(&mut self, descriptor: Arc<ExtensionDescriptor>) {
        let id = descriptor.id().to_string();
        self.incompatible.retain(|record| record.id != id);
        if self.active.insert(id.clone(), descriptor).is_some() {
            self.order.retain(|existing| existing != &id);
        }
        self.order.push(id);
    }

    /// Record `descriptor` as incompatible, removing it from the active set if
    /// it was there. Only the latest record per identity is kept.
    pub fn excise(&mut self, descriptor: &ExtensionDescriptor, reason: IncompatibleReason) -> Incompatibility {
        tracing::warn!(
            extension = descriptor.id(),
            version = %descriptor.version(),
            "excised: {reason}"
        );
        self.remove_active(descriptor.id());
        let record = Incompatibility::new(descriptor, reason);
        self.incompatible.retain(|existing| existing.id != record.id);
        self.incompatible.push(record.clone());
        record
    }

    /// Drop `id` from the active set without recording it as incompatible.
    pub fn remove_active(&mut self, id: &str) -> Option<Arc<ExtensionDescriptor>> {
        let removed = self.active.remove(id);
        if removed.is_some() {
            self.order.retain(|existing| existing != id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ExtensionDescriptor>> {
        self.active.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn active(&self) -> &BTreeMap<String, Arc<ExtensionDescriptor>> {
        &self.active
    }

    /// Active descriptors in initialization order.
    pub fn initialization_order(&self) -> impl DoubleEndedIterator<Item = &Arc<ExtensionDescriptor>> {
        self.order.iter().filter_map(|id| self.active.get(id))
    }

    pub fn order_ids(&self) -> &[String] {
        &self.order
    }

    pub fn incompatible(&self) -> &[Incompatibility] {
        &self.incompatible
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active extensions that depend on `id`, directly or transitively, in
    /// reverse initialization order.
    pub fn dependents_of(&self, id: &str) -> Vec<Arc<ExtensionDescriptor>> {
        let mut affected: BTreeSet<&str> = BTreeSet::from([id]);
        let mut dependents = Vec::new();
        for descriptor in self.initialization_order() {
            if descriptor
                .dependencies()
                .iter()
                .any(|dep| affected.contains(dep.id.as_str()))
                && descriptor.id() != id
            {
                affected.insert(descriptor.id());
                dependents.push(Arc::clone(descriptor));
            }
        }
        dependents.reverse();
        dependents
    }

    /// Whether every active extension comes after all of its dependencies.
    pub fn order_is_consistent(&self) -> bool {
        let mut seen = BTreeSet::new();
        for descriptor in self.initialization_order() {
            let satisfied = descriptor
                .dependencies()
                .iter()
                .all(|dep| seen.contains(dep.id.as_str()));
            if !satisfied {
                return false;
            }
            seen.insert(descriptor.id());
        }
        seen.len() == self.active.len()
    }
}
