//! Extension contract and the guard every call into extension code runs under.

use crate::cache::ExtensionResources;
use crate::error::ExtensionError;
use crate::host::ResourceHandle;
use mod_hooks::{panic_message, HookCallback, HookError, HookTable, SubscriptionId};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Behaviour an extension author provides.
///
/// # Lifecycle
///
/// 1. **Construct**: the [`ExtensionFactory`] builds the extension; its
///    [`resource_requests`](Extension::resource_requests) are collected.
/// 2. **Preload**: the runtime loads every requested resource.
/// 3. **Initialize**: [`initialize`](Extension::initialize) receives the
///    extension's own slice of preloaded resources and subscribes to hooks.
/// 4. **Toggle**: toggle-capable extensions can be unloaded and initialized
///    again while the host runs.
///
/// Errors and panics from any of these methods are caught and recorded on the
/// extension; they never reach the host.
pub trait Extension: Send {
    /// Version string shown in the status text.
    fn version(&self) -> &str {
        "UNKNOWN"
    }

    /// `(group, path)` pairs this extension needs before it initializes.
    fn resource_requests(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Callbacks run against a resource group while it is open during the
    /// preload. A group named only here is still opened.
    fn group_hooks(&self) -> Vec<GroupHook> {
        Vec::new()
    }

    fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError>;

    /// Whether the extension can be disabled and re-enabled at runtime.
    fn is_toggleable(&self) -> bool {
        false
    }

    /// Undoes [`initialize`](Extension::initialize). Only called on
    /// toggle-capable extensions.
    fn unload(&mut self, _ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        Err(ExtensionError::Unsupported)
    }
}

/// Constructs one extension. Identity and load priority live on the factory
/// so the registry can order construction itself.
pub trait ExtensionFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Lower priorities load first.
    fn priority(&self) -> i32 {
        0
    }

    fn create(&self) -> Result<Box<dyn Extension>, ExtensionError>;
}

pub type GroupHookFn = dyn Fn(&[ResourceHandle]) -> Result<(), ExtensionError> + Send + Sync;

/// A callback bound to one resource group.
///
/// It receives the group's top-level resources after the group is opened
/// and before the requested resources are copied out. Errors and panics are
/// logged and never affect the rest of the group.
#[derive(Clone)]
pub struct GroupHook {
    group: String,
    callback: Arc<GroupHookFn>,
}

impl GroupHook {
    pub fn new<F>(group: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&[ResourceHandle]) -> Result<(), ExtensionError> + Send + Sync + 'static,
    {
        Self {
            group: group.into(),
            callback: Arc::new(callback),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub(crate) fn run(&self, roots: &[ResourceHandle]) -> Result<(), ExtensionError> {
        guard(|| (self.callback)(roots))
    }
}

impl fmt::Debug for GroupHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupHook").field("group", &self.group).finish()
    }
}

type Constructor<T> = Box<dyn Fn() -> Result<T, ExtensionError> + Send + Sync>;

/// Factory built from a closure.
pub struct SimpleExtensionFactory<T> {
    name: String,
    priority: i32,
    constructor: Constructor<T>,
}

impl<T: Extension + 'static> SimpleExtensionFactory<T> {
    pub fn new<F>(name: impl Into<String>, priority: i32, constructor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::fallible(name, priority, move || Ok(constructor()))
    }

    /// Factory whose constructor may fail.
    pub fn fallible<F>(name: impl Into<String>, priority: i32, constructor: F) -> Self
    where
        F: Fn() -> Result<T, ExtensionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority,
            constructor: Box::new(constructor),
        }
    }

    pub fn boxed(self) -> Box<dyn ExtensionFactory> {
        Box::new(self)
    }
}

impl<T: Extension + 'static> ExtensionFactory for SimpleExtensionFactory<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn create(&self) -> Result<Box<dyn Extension>, ExtensionError> {
        let extension = (self.constructor)()?;
        Ok(Box::new(extension))
    }
}

/// What an extension sees while it initializes or unloads.
pub struct ExtensionContext {
    name: String,
    hooks: Arc<HookTable>,
    preloads: Option<ExtensionResources>,
}

impl ExtensionContext {
    pub fn new(
        name: impl Into<String>,
        hooks: Arc<HookTable>,
        preloads: Option<ExtensionResources>,
    ) -> Self {
        Self {
            name: name.into(),
            hooks,
            preloads,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hooks(&self) -> &Arc<HookTable> {
        &self.hooks
    }

    /// Resources preloaded for this extension. `None` when re-enabled after a
    /// toggle-off.
    pub fn preloads(&self) -> Option<&ExtensionResources> {
        self.preloads.as_ref()
    }

    /// Subscribes with this extension as the owner.
    pub fn subscribe(&self, hook: &str, callback: HookCallback) -> Result<SubscriptionId, HookError> {
        self.hooks.subscribe(hook, callback, Some(&self.name))
    }
}

/// Runs extension code, turning a panic into [`ExtensionError::Panicked`].
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, ExtensionError>) -> Result<T, ExtensionError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ExtensionError::Panicked(panic_message(payload.as_ref()))),
    }
}
