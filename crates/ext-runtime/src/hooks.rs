//! Optional lifecycle hooks of an extension.
//!
//! An extension may declare an `Initialization-Class`. When that unit resolves
//! through the extension's scope, the host looks it up in its
//! [`InitializerCatalog`] and calls the hooks on the returned value. Every
//! hook defaults to doing nothing, so an initializer only implements what it
//! needs.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::descriptor::ExtensionDescriptor;
use crate::scope::ResolutionScope;
use crate::version::VersionNumber;

/// Error type returned by hooks and host registrars.
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult = Result<(), HostError>;

/// What a hook gets to see.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub descriptor: &'a ExtensionDescriptor,
    pub scope: &'a ResolutionScope,
    pub host_version: &'a VersionNumber,
    pub headless: bool,
}

pub trait ExtensionHooks: Send {
    fn init_plugin(&mut self, _ctx: &HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Skipped when the host runs headless.
    fn init_gui(&mut self, _ctx: &HookContext<'_>) -> HookResult {
        Ok(())
    }

    fn init_final_checks(&mut self, _ctx: &HookContext<'_>) -> HookResult {
        Ok(())
    }

    fn init_plugin_manager(&mut self, _ctx: &HookContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called when the extension is unregistered or the runtime shuts down.
    /// Failures are logged only.
    fn tear_down(&mut self, _ctx: &HookContext<'_>) -> HookResult {
        Ok(())
    }
}

/// The hooks run during initialization, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    InitPlugin,
    InitGui,
    InitFinalChecks,
    InitPluginManager,
    TearDown,
}

impl Hook {
    pub const STARTUP: [Hook; 4] = [
        Hook::InitPlugin,
        Hook::InitGui,
        Hook::InitFinalChecks,
        Hook::InitPluginManager,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitPlugin => "init_plugin",
            Self::InitGui => "init_gui",
            Self::InitFinalChecks => "init_final_checks",
            Self::InitPluginManager => "init_plugin_manager",
            Self::TearDown => "tear_down",
        }
    }

    /// Call this hook on `hooks`, turning a panic into an error.
    pub fn invoke(self, hooks: &mut dyn ExtensionHooks, ctx: &HookContext<'_>) -> HookResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| match self {
            Self::InitPlugin => hooks.init_plugin(ctx),
            Self::InitGui => hooks.init_gui(ctx),
            Self::InitFinalChecks => hooks.init_final_checks(ctx),
            Self::InitPluginManager => hooks.init_plugin_manager(ctx),
            Self::TearDown => hooks.tear_down(ctx),
        }));
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(panic_message(payload.as_ref()).into()),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

type HookFactory = Box<dyn Fn() -> Box<dyn ExtensionHooks> + Send + Sync>;

/// Maps initializer symbol names to hook implementations.
#[derive(Default)]
pub struct InitializerCatalog {
    factories: BTreeMap<String, HookFactory>,
}

impl InitializerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, symbol: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ExtensionHooks> + Send + Sync + 'static,
    {
        self.factories.insert(symbol.into(), Box::new(factory));
    }

    pub fn with<F>(mut self, symbol: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExtensionHooks> + Send + Sync + 'static,
    {
        self.register(symbol, factory);
        self
    }

    pub fn instantiate(&self, symbol: &str) -> Option<Box<dyn ExtensionHooks>> {
        self.factories.get(symbol).map(|factory| factory())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.factories.contains_key(symbol)
    }
}

impl fmt::Debug for InitializerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveIndex;
    use crate::manifest::Manifest;
    use ext_fs::NormalizedPath;
    use std::sync::Arc;

    struct Panicking;

    impl ExtensionHooks for Panicking {
        fn init_plugin(&mut self, _ctx: &HookContext<'_>) -> HookResult {
            panic!("init exploded");
        }

        fn init_final_checks(&mut self, _ctx: &HookContext<'_>) -> HookResult {
            Err("checks failed".into())
        }
    }

    struct Noop;
    impl ExtensionHooks for Noop {}

    fn with_context(f: impl FnOnce(&HookContext<'_>)) {
        let manifest = Manifest::parse("Extension-ID: a\n").unwrap();
        let descriptor =
            ExtensionDescriptor::from_manifest(NormalizedPath::new("/ext/a.ext"), &manifest, ArchiveIndex::default())
                .unwrap();
        let scope = ResolutionScope::new("a", ArchiveIndex::default(), Arc::new(ArchiveIndex::default()), vec![]);
        let host = VersionNumber::new(9, 0, 0);
        f(&HookContext {
            descriptor: &descriptor,
            scope: &scope,
            host_version: &host,
            headless: true,
        });
    }

    #[test]
    fn test_default_hooks_succeed() {
        with_context(|ctx| {
            let mut hooks = Noop;
            for hook in Hook::STARTUP {
                assert!(hook.invoke(&mut hooks, ctx).is_ok());
            }
            assert!(Hook::TearDown.invoke(&mut hooks, ctx).is_ok());
        });
    }

    #[test]
    fn test_panics_and_errors_are_reported() {
        with_context(|ctx| {
            let mut hooks = Panicking;
            let err = Hook::InitPlugin.invoke(&mut hooks, ctx).unwrap_err();
            assert_eq!(err.to_string(), "panicked: init exploded");
            let err = Hook::InitFinalChecks.invoke(&mut hooks, ctx).unwrap_err();
            assert_eq!(err.to_string(), "checks failed");
        });
    }

    #[test]
    fn test_catalog_instantiates_registered_symbols() {
        let catalog = InitializerCatalog::new().with("com.acme.Init", || Box::new(Noop));
        assert!(catalog.contains("com.acme.Init"));
        assert!(catalog.instantiate("com.acme.Init").is_some());
        assert!(catalog.instantiate("com.acme.Other").is_none());
    }
}
