//! Extension loading runtime.
//!
//! Discovers extension archives, settles version conflicts, applies the
//! blacklist/whitelist policy, orders extensions by their dependencies,
//! wires per-extension resolution scopes and drives the initialization
//! phases. A broken extension is excised and recorded; it never stops the
//! others from loading.

pub mod archive;
pub mod conflict;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod host;
pub mod lifecycle;
pub mod managed;
pub mod manifest;
pub mod policy;
pub mod registry;
pub mod runtime;
pub mod scanner;
pub mod scope;
pub mod settings;
pub mod signature;
pub mod version;

pub use archive::ArchiveIndex;
pub use conflict::{ConflictReason, ConflictRecord, ConflictResolver};
pub use dependency::DependencySpec;
pub use descriptor::{DescriptorSummary, ExtensionDescriptor};
pub use error::{Error, Result};
pub use graph::DependencyGraphBuilder;
pub use hooks::{ExtensionHooks, HookContext, HookResult, InitializerCatalog};
pub use host::{CapabilityRegistrar, DescriptionRegistrar, OperatorCatalog, ResourceCatalog};
pub use lifecycle::LifecycleDriver;
pub use managed::{ManagedExtension, ManagedStore};
pub use policy::{Blacklist, BlacklistRange, PolicyFilter, Whitelist};
pub use registry::{IncompatibleReason, Incompatibility, Registry};
pub use runtime::{ExtensionRuntime, ResolutionReport};
pub use scope::{Location, Provider, ResolutionScope, ScopeTable, Visibility};
pub use settings::RuntimeSettings;
pub use signature::{SecurityPolicy, TrustedSigners};
pub use version::VersionNumber;
