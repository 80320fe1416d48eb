//! The three initialization phases.
//!
//! Phases run strictly one after another, each visiting the initialization
//! order front to back:
//!
//! - **A** registers descriptions; a failure excises the extension
//! - **B** registers capabilities; a failure is reported only
//! - **C** re-checks dependencies and runs the initializer hooks; a failure
//!   excises the extension and skips its remaining hooks
//!
//! Failures never stop the other extensions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;
use crate::hooks::{ExtensionHooks, Hook, HookContext, InitializerCatalog};
use crate::host::{CapabilityRegistrar, DescriptionRegistrar};
use crate::registry::IncompatibleReason;
use crate::scope::{ScopeTable, Visibility};
use crate::version::VersionNumber;

/// A non-excising Phase B problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityFailure {
    pub id: String,
    pub message: String,
}

/// Result of one lifecycle run.
#[derive(Default)]
pub struct LifecycleOutcome {
    /// Extensions that completed all phases, in initialization order.
    pub activated: Vec<Arc<ExtensionDescriptor>>,
    pub excised: Vec<(Arc<ExtensionDescriptor>, IncompatibleReason)>,
    pub capability_failures: Vec<CapabilityFailure>,
    /// Hook instances of activated extensions, kept for tear-down.
    pub hooks: BTreeMap<String, Box<dyn ExtensionHooks>>,
}

pub struct LifecycleDriver<'a> {
    pub descriptions: &'a mut dyn DescriptionRegistrar,
    pub capabilities: &'a mut dyn CapabilityRegistrar,
    pub initializers: &'a InitializerCatalog,
    pub host_version: &'a VersionNumber,
    pub headless: bool,
}

impl LifecycleDriver<'_> {
    /// Run all phases over `order`.
    ///
    /// `order` must be wired in `scopes`. `already_active` lists extensions
    /// initialized by earlier runs, which satisfy dependencies in Phase C.
    pub fn run(
        &mut self,
        order: Vec<Arc<ExtensionDescriptor>>,
        scopes: &ScopeTable,
        already_active: &BTreeSet<String>,
    ) -> LifecycleOutcome {
        let mut outcome = LifecycleOutcome::default();

        let mut alive = Vec::with_capacity(order.len());
        for descriptor in order {
            match scopes.get(descriptor.id()) {
                Some(_) => alive.push(descriptor),
                None => {
                    let missing = first_missing_scope(&descriptor, scopes);
                    outcome
                        .excised
                        .push((descriptor, IncompatibleReason::DependencyExcised { dependency: missing }));
                }
            }
        }

        let alive = self.register_descriptions(alive, scopes, &mut outcome);
        self.register_capabilities(&alive, scopes, &mut outcome);
        self.run_hooks(alive, scopes, already_active, &mut outcome);

        tracing::info!(
            activated = outcome.activated.len(),
            excised = outcome.excised.len(),
            capability_failures = outcome.capability_failures.len(),
            "lifecycle complete"
        );
        outcome
    }

    fn register_descriptions(
        &mut self,
        order: Vec<Arc<ExtensionDescriptor>>,
        scopes: &ScopeTable,
        outcome: &mut LifecycleOutcome,
    ) -> Vec<Arc<ExtensionDescriptor>> {
        let mut alive = Vec::with_capacity(order.len());
        for descriptor in order {
            let Some(scope) = scopes.get(descriptor.id()) else {
                continue;
            };
            match self.descriptions.register_descriptions(&descriptor, scope) {
                Ok(()) => alive.push(descriptor),
                Err(e) => {
                    self.descriptions.unregister(descriptor.id());
                    outcome.excised.push((
                        descriptor,
                        IncompatibleReason::DescriptionRegistration { message: e.to_string() },
                    ));
                }
            }
        }
        alive
    }

    fn register_capabilities(
        &mut self,
        order: &[Arc<ExtensionDescriptor>],
        scopes: &ScopeTable,
        outcome: &mut LifecycleOutcome,
    ) {
        for descriptor in order {
            let Some(scope) = scopes.get(descriptor.id()) else {
                continue;
            };
            if let Err(e) = self.capabilities.register_capabilities(descriptor, scope) {
                tracing::warn!(extension = descriptor.id(), "capability registration failed: {e}");
                outcome.capability_failures.push(CapabilityFailure {
                    id: descriptor.id().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn run_hooks(
        &mut self,
        order: Vec<Arc<ExtensionDescriptor>>,
        scopes: &ScopeTable,
        already_active: &BTreeSet<String>,
        outcome: &mut LifecycleOutcome,
    ) {
        let mut active: BTreeSet<String> = already_active.clone();

        for descriptor in order {
            let Some(scope) = scopes.get(descriptor.id()) else {
                continue;
            };

            if let Some(dep) = descriptor
                .dependencies()
                .iter()
                .find(|dep| !active.contains(&dep.id))
            {
                let reason = IncompatibleReason::DependencyExcised {
                    dependency: dep.id.clone(),
                };
                self.withdraw(descriptor.id());
                outcome.excised.push((descriptor, reason));
                continue;
            }

            let ctx = HookContext {
                descriptor: &descriptor,
                scope,
                host_version: self.host_version,
                headless: self.headless,
            };

            match self.initialize(&ctx) {
                Ok(hooks) => {
                    active.insert(descriptor.id().to_string());
                    if let Some(hooks) = hooks {
                        outcome.hooks.insert(descriptor.id().to_string(), hooks);
                    }
                    outcome.activated.push(descriptor);
                }
                Err(reason) => {
                    self.withdraw(descriptor.id());
                    outcome.excised.push((descriptor, reason));
                }
            }
        }
    }

    /// Locate the initializer and run its startup hooks.
    fn initialize(&self, ctx: &HookContext<'_>) -> Result<Option<Box<dyn ExtensionHooks>>, IncompatibleReason> {
        let descriptor = ctx.descriptor;
        let Some(symbol) = descriptor.initializer() else {
            return Ok(None);
        };
        if ctx.scope.resolve_symbol(symbol, Visibility::Full).is_none() {
            tracing::warn!(extension = descriptor.id(), symbol, "initializer unit not found, no hooks run");
            return Ok(None);
        }
        let Some(mut hooks) = self.initializers.instantiate(symbol) else {
            tracing::debug!(extension = descriptor.id(), symbol, "no hook implementation registered");
            return Ok(None);
        };

        for hook in Hook::STARTUP {
            if hook == Hook::InitGui && ctx.headless {
                continue;
            }
            tracing::debug!(extension = descriptor.id(), %hook, "invoking hook");
            hook.invoke(hooks.as_mut(), ctx)
                .map_err(|e| IncompatibleReason::HookInvocation {
                    hook: hook.to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(Some(hooks))
    }

    fn withdraw(&mut self, id: &str) {
        self.descriptions.unregister(id);
        self.capabilities.unregister(id);
    }
}

fn first_missing_scope(descriptor: &ExtensionDescriptor, scopes: &ScopeTable) -> String {
    descriptor
        .dependencies()
        .iter()
        .find(|dep| scopes.get(&dep.id).is_none())
        .map(|dep| dep.id.clone())
        .unwrap_or_else(|| descriptor.id().to_string())
}
