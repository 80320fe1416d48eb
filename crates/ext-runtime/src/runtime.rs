//! The extension runtime.
//!
//! [`ExtensionRuntime`] owns the registry, the scope table and the host
//! registrars, and runs the resolution pipeline:
//!
//! scan -> conflicts -> policy -> host version -> dependency graph ->
//! scopes -> lifecycle phases -> registry
//!
//! The pipeline runs once at startup and again for every batch registered
//! later. Neither run replaces an extension that is already active.

use std::collections::BTreeSet;
use std::sync::Arc;

use ext_fs::NormalizedPath;
use serde::Serialize;

use crate::archive::ArchiveIndex;
use crate::conflict::{ConflictRecord, ConflictResolver};
use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::graph::DependencyGraphBuilder;
use crate::hooks::{ExtensionHooks, Hook, HookContext, InitializerCatalog};
use crate::host::{CapabilityRegistrar, DescriptionRegistrar, OperatorCatalog, ResourceCatalog};
use crate::lifecycle::{CapabilityFailure, LifecycleDriver};
use crate::managed::ManagedStore;
use crate::policy::PolicyFilter;
use crate::registry::{IncompatibleReason, Incompatibility, Registry};
use crate::scanner::{self, Discovery, RejectedArchive};
use crate::scope::{Location, ResolutionScope, ScopeTable, Visibility};
use crate::settings::RuntimeSettings;
use crate::version::VersionNumber;

/// What one pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub rejected: Vec<RejectedArchive>,
    pub conflicts: Vec<ConflictRecord>,
    /// Newly activated identities, in initialization order.
    pub activated: Vec<String>,
    pub incompatible: Vec<Incompatibility>,
    pub capability_failures: Vec<CapabilityFailure>,
}

pub struct ExtensionRuntime {
    policy: PolicyFilter,
    host_version: Option<VersionNumber>,
    headless: bool,
    scan_roots: Vec<NormalizedPath>,
    managed_root: Option<NormalizedPath>,
    registry: Registry,
    scopes: ScopeTable,
    descriptions: Box<dyn DescriptionRegistrar>,
    capabilities: Box<dyn CapabilityRegistrar>,
    initializers: InitializerCatalog,
    hooks: std::collections::BTreeMap<String, Box<dyn ExtensionHooks>>,
    started: bool,
}

impl Default for ExtensionRuntime {
    fn default() -> Self {
        Self::new(PolicyFilter::new())
    }
}

impl ExtensionRuntime {
    pub fn new(policy: PolicyFilter) -> Self {
        Self {
            policy,
            host_version: None,
            headless: false,
            scan_roots: Vec::new(),
            managed_root: None,
            registry: Registry::new(),
            scopes: ScopeTable::new(ArchiveIndex::default()),
            descriptions: Box::new(ResourceCatalog::new()),
            capabilities: Box::new(OperatorCatalog::new()),
            initializers: InitializerCatalog::new(),
            hooks: std::collections::BTreeMap::new(),
            started: false,
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Result<Self> {
        Ok(Self::new(settings.policy_filter()?)
            .with_host_version(settings.host_version.clone())
            .with_headless(settings.headless)
            .with_scan_roots(settings.scan_roots())
            .with_managed_root(settings.managed_root()))
    }

    pub fn with_host_version(mut self, version: Option<VersionNumber>) -> Self {
        self.host_version = version;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_scan_roots(mut self, roots: Vec<NormalizedPath>) -> Self {
        self.scan_roots = roots;
        self
    }

    pub fn with_managed_root(mut self, root: Option<NormalizedPath>) -> Self {
        self.managed_root = root;
        self
    }

    /// Resources shared by every extension, searched after the extension's
    /// own archive.
    pub fn with_core(mut self, core: ArchiveIndex) -> Self {
        self.scopes = ScopeTable::new(core);
        self
    }

    pub fn with_initializers(mut self, initializers: InitializerCatalog) -> Self {
        self.initializers = initializers;
        self
    }

    pub fn with_description_registrar(mut self, registrar: Box<dyn DescriptionRegistrar>) -> Self {
        self.descriptions = registrar;
        self
    }

    pub fn with_capability_registrar(mut self, registrar: Box<dyn CapabilityRegistrar>) -> Self {
        self.capabilities = registrar;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn policy(&self) -> &PolicyFilter {
        &self.policy
    }

    pub fn descriptions(&self) -> &dyn DescriptionRegistrar {
        self.descriptions.as_ref()
    }

    pub fn capabilities(&self) -> &dyn CapabilityRegistrar {
        self.capabilities.as_ref()
    }

    pub fn scope(&self, id: &str) -> Option<&Arc<ResolutionScope>> {
        self.scopes.get(id)
    }

    /// Resolve a resource or symbol name in the scope of an active extension.
    pub fn lookup(&self, id: &str, name: &str, symbol: bool, visibility: Visibility) -> Result<Option<Location>> {
        let scope = self
            .scopes
            .get(id)
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;
        Ok(if symbol {
            scope.resolve_symbol(name, visibility)
        } else {
            scope.resolve_resource(name, visibility)
        })
    }

    /// Scan the configured roots and the managed store, then resolve and
    /// initialize everything found.
    pub fn start(&mut self) -> Result<ResolutionReport> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        self.started = true;

        let mut discovery = scanner::discover(&self.scan_roots);
        if let Some(root) = &self.managed_root {
            let store = ManagedStore::open(root.clone())?;
            discovery.extend(scanner::load_archives(&store.archives_to_load()));
        }
        Ok(self.run_pipeline(discovery))
    }

    /// Resolve and initialize additional archives against the running set.
    pub fn register_archives(&mut self, paths: &[NormalizedPath]) -> ResolutionReport {
        self.started = true;
        self.run_pipeline(scanner::load_archives(paths))
    }

    /// Resolve and initialize already loaded descriptors.
    pub fn register_descriptors(&mut self, descriptors: Vec<Arc<ExtensionDescriptor>>) -> ResolutionReport {
        self.started = true;
        self.run_pipeline(Discovery {
            descriptors,
            rejected: Vec::new(),
        })
    }

    fn run_pipeline(&mut self, discovery: Discovery) -> ResolutionReport {
        let Discovery { descriptors, rejected } = discovery;
        let mut report = ResolutionReport {
            rejected,
            ..ResolutionReport::default()
        };

        let conflicts = ConflictResolver::new(&self.policy).resolve_batch(descriptors, self.registry.active());
        report.conflicts = conflicts.conflicts;

        let mut candidates = Vec::with_capacity(conflicts.survivors.len());
        for descriptor in conflicts.survivors {
            if let Err(rejection) = self.policy.check(&descriptor) {
                self.excise(&descriptor, IncompatibleReason::PolicyRejected { rejection }, &mut report);
                continue;
            }
            if let Some(host) = &self.host_version {
                if descriptor.required_host_version() > host {
                    let reason = IncompatibleReason::HostTooOld {
                        required: descriptor.required_host_version().clone(),
                        host: host.clone(),
                    };
                    self.excise(&descriptor, reason, &mut report);
                    continue;
                }
            }
            candidates.push(descriptor);
        }

        let graph = DependencyGraphBuilder::new(self.registry.active()).build(candidates);
        for (descriptor, reason) in graph.excised {
            self.excise(&descriptor, reason, &mut report);
        }

        let mut wired = Vec::with_capacity(graph.order.len());
        for descriptor in graph.order {
            match self.scopes.build(&descriptor) {
                Ok(_) => wired.push(descriptor),
                Err(dependency) => {
                    self.excise(&descriptor, IncompatibleReason::DependencyExcised { dependency }, &mut report);
                }
            }
        }

        let already_active: BTreeSet<String> = self.registry.active().keys().cloned().collect();
        let host_version = self.host_version.clone().unwrap_or_default();
        let outcome = LifecycleDriver {
            descriptions: self.descriptions.as_mut(),
            capabilities: self.capabilities.as_mut(),
            initializers: &self.initializers,
            host_version: &host_version,
            headless: self.headless,
        }
        .run(wired, &self.scopes, &already_active);

        for (descriptor, reason) in outcome.excised {
            self.scopes.remove(descriptor.id());
            self.excise(&descriptor, reason, &mut report);
        }
        for descriptor in outcome.activated {
            report.activated.push(descriptor.id().to_string());
            self.registry.activate(descriptor);
        }
        self.hooks.extend(outcome.hooks);
        report.capability_failures = outcome.capability_failures;

        tracing::info!(
            active = self.registry.len(),
            activated = report.activated.len(),
            incompatible = report.incompatible.len(),
            "extension resolution finished"
        );
        report
    }

    fn excise(&mut self, descriptor: &ExtensionDescriptor, reason: IncompatibleReason, report: &mut ResolutionReport) {
        report.incompatible.push(self.registry.excise(descriptor, reason));
    }

    /// Tear down one active extension and every active extension depending
    /// on it. Dependents go first and are recorded as incompatible.
    ///
    /// Returns the torn-down identities in tear-down order.
    pub fn unregister_one(&mut self, id: &str) -> Result<Vec<String>> {
        let target = self
            .registry
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;

        let mut removed = Vec::new();
        for dependent in self.registry.dependents_of(id) {
            self.tear_down(&dependent);
            self.registry.excise(
                &dependent,
                IncompatibleReason::DependencyUnregistered {
                    dependency: id.to_string(),
                },
            );
            removed.push(dependent.id().to_string());
        }

        self.tear_down(&target);
        self.registry.remove_active(id);
        removed.push(id.to_string());
        tracing::info!(extension = id, removed = removed.len(), "extension unregistered");
        Ok(removed)
    }

    /// Tear down every active extension in reverse initialization order.
    pub fn shutdown(&mut self) -> Vec<String> {
        let order: Vec<Arc<ExtensionDescriptor>> = self.registry.initialization_order().rev().cloned().collect();
        let mut removed = Vec::with_capacity(order.len());
        for descriptor in order {
            self.tear_down(&descriptor);
            self.registry.remove_active(descriptor.id());
            removed.push(descriptor.id().to_string());
        }
        tracing::info!(removed = removed.len(), "extension runtime shut down");
        removed
    }

    fn tear_down(&mut self, descriptor: &ExtensionDescriptor) {
        let id = descriptor.id();
        if let (Some(mut hooks), Some(scope)) = (self.hooks.remove(id), self.scopes.get(id)) {
            let host_version = self.host_version.clone().unwrap_or_default();
            let ctx = HookContext {
                descriptor,
                scope,
                host_version: &host_version,
                headless: self.headless,
            };
            if let Err(e) = Hook::TearDown.invoke(hooks.as_mut(), &ctx) {
                tracing::warn!(extension = id, "tear_down failed: {e}");
            }
        }
        self.descriptions.unregister(id);
        self.capabilities.unregister(id);
        self.scopes.remove(id);
        tracing::debug!(extension = id, "torn down");
    }
}
