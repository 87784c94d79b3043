//! # Mod Loader
//!
//! Discovers extensions, preloads the host resources they ask for and drives
//! each one through its lifecycle while keeping failures contained to the
//! extension that caused them.
//!
//! ## Startup flow
//!
//! 1. [`ExtensionRegistry::discover`] records every extension factory.
//! 2. Extensions are constructed in load-priority order and report the
//!    `(group, path)` resources they need.
//! 3. [`planner::plan`] groups those requests per resource group.
//! 4. [`BatchedLoader`] opens each group, copies the requested resources out
//!    and closes the group again, with a bounded number of groups open at once.
//! 5. Every extension is initialized in priority order with its own slice of
//!    the [`ResourceCache`].
//!
//! [`ModRuntime::run_startup`] runs the whole sequence. Afterwards the
//! [`mod_hooks::HookTable`] is the interface between host and extensions.

pub mod cache;
pub mod config;
pub mod error;
pub mod extension;
pub mod host;
pub mod lifecycle;
pub mod loader;
pub mod memory;
pub mod planner;
pub mod progress;
pub mod registry;
pub mod request;
pub mod runtime;
pub mod status;
pub mod warmup;

pub use cache::{ExtensionResources, ResourceCache};
pub use config::RuntimeConfig;
pub use error::{ErrorState, ExtensionError, HostError, RequestError, RuntimeError};
pub use extension::{
    Extension, ExtensionContext, ExtensionFactory, GroupHook, SimpleExtensionFactory,
};
pub use host::{ResourceHandle, ResourceHost};
pub use lifecycle::LifecycleExecutor;
pub use loader::BatchedLoader;
pub use memory::{MemoryHost, MemoryResource};
pub use planner::{GroupPlan, PreloadPlan};
pub use progress::{NullProgress, ProgressSink, SmoothedProgress};
pub use registry::{ExtensionInstance, ExtensionRegistry, LifecycleState};
pub use request::ResourceRequest;
pub use runtime::{LoadState, ModRuntime, StartupReport};
pub use status::{ExtensionStatus, LogStatus, NullStatus, StatusSink};

pub use mod_hooks;
