//! Drives extensions through construct, initialize and toggle transitions.
//!
//! Every call into extension code runs under a panic guard. Failures are
//! recorded on the instance as a terminal [`ErrorState`] and logged; they
//! never propagate to the caller.

use crate::cache::ExtensionResources;
use crate::error::{ErrorState, ExtensionError, RuntimeError};
use crate::extension::{guard, ExtensionContext};
use crate::registry::{ExtensionInstance, ExtensionRegistry, LifecycleState};
use crate::status::{self, StatusSink};
use mod_hooks::HookTable;
use std::backtrace::Backtrace;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Executes lifecycle transitions against a registry.
#[derive(Clone)]
pub struct LifecycleExecutor {
    hooks: Arc<HookTable>,
    status: Arc<dyn StatusSink>,
}

impl LifecycleExecutor {
    pub fn new(hooks: Arc<HookTable>, status: Arc<dyn StatusSink>) -> Self {
        Self { hooks, status }
    }

    /// `Discovered -> Constructed | Failed(ConstructFailed)`.
    ///
    /// Returns true if the extension was constructed. Instances in any other
    /// state are left alone.
    pub fn construct(&self, registry: &mut ExtensionRegistry, name: &str) -> bool {
        let Some(instance) = registry.get_mut(name) else {
            return false;
        };
        if instance.state() != &LifecycleState::Discovered {
            debug!("Not constructing {} in state {:?}", name, instance.state());
            return false;
        }

        debug!("Constructing extension {}", name);
        let built = guard(|| {
            let extension = instance.factory().create()?;
            let version = extension.version().to_string();
            let requests = extension.resource_requests();
            let group_hooks = extension.group_hooks();
            let toggleable = extension.is_toggleable();
            Ok((extension, version, requests, group_hooks, toggleable))
        });

        let constructed = match built {
            Ok((extension, version, requests, group_hooks, toggleable)) => {
                instance.mark_constructed(extension, version, requests, group_hooks, toggleable);
                true
            }
            Err(e) => {
                report_failure(name, "construct", &e);
                instance.fail(ErrorState::ConstructFailed(e.to_string()));
                false
            }
        };

        self.publish_status(registry);
        constructed
    }

    /// `Constructed -> Initialized | Failed(InitializeFailed)`.
    ///
    /// `preloads` is this extension's slice of the resource cache.
    pub fn initialize(
        &self,
        registry: &mut ExtensionRegistry,
        name: &str,
        preloads: Option<ExtensionResources>,
    ) -> bool {
        let Some(instance) = registry.get_mut(name) else {
            return false;
        };
        if instance.state() != &LifecycleState::Constructed {
            debug!("Not initializing {} in state {:?}", name, instance.state());
            return false;
        }

        let initialized = self.run_initialize(instance, preloads);
        self.publish_status(registry);
        initialized
    }

    /// `Initialized -> Disabled | Failed(UnloadFailed)`.
    ///
    /// `Ok(false)` when the extension is not toggle-capable or not
    /// initialized. Subscriptions the extension left behind are removed so a
    /// disabled extension stays inert.
    pub fn toggle_off(&self, registry: &mut ExtensionRegistry, name: &str) -> Result<bool, RuntimeError> {
        let instance = registry
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownExtension(name.to_string()))?;
        if !instance.is_toggleable() || instance.state() != &LifecycleState::Initialized {
            debug!("Ignoring toggle-off of {} in state {:?}", name, instance.state());
            return Ok(false);
        }

        let ctx = ExtensionContext::new(name, self.hooks.clone(), None);
        let unloaded = match instance.extension_mut() {
            Some(extension) => guard(|| extension.unload(&ctx)),
            None => Err(ExtensionError::failed("extension was never constructed")),
        };

        match unloaded {
            Ok(()) => {
                instance.set_state(LifecycleState::Disabled);
                let leftover = self.hooks.unsubscribe_owner(name);
                if leftover > 0 {
                    warn!(
                        "⚠️ Extension {} left {} hook subscriptions after unloading",
                        name, leftover
                    );
                }
                info!("⏸️ Extension {} disabled", name);
            }
            Err(e) => {
                report_failure(name, "unload", &e);
                instance.fail(ErrorState::UnloadFailed(e.to_string()));
            }
        }

        self.publish_status(registry);
        Ok(true)
    }

    /// `Disabled -> Initialized | Failed(InitializeFailed)`.
    ///
    /// The extension is initialized again without preloaded resources.
    pub fn toggle_on(&self, registry: &mut ExtensionRegistry, name: &str) -> Result<bool, RuntimeError> {
        let instance = registry
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownExtension(name.to_string()))?;
        if !instance.is_toggleable() || instance.state() != &LifecycleState::Disabled {
            debug!("Ignoring toggle-on of {} in state {:?}", name, instance.state());
            return Ok(false);
        }

        self.run_initialize(instance, None);
        self.publish_status(registry);
        Ok(true)
    }

    /// Regenerates the status text and hands it to the status sink.
    pub fn publish_status(&self, registry: &ExtensionRegistry) {
        let text = status::render(&status::summary(registry), registry);
        self.status.publish(&text);
    }

    fn run_initialize(
        &self,
        instance: &mut ExtensionInstance,
        preloads: Option<ExtensionResources>,
    ) -> bool {
        let name = instance.name().to_string();
        let version = instance.version().to_string();
        let ctx = ExtensionContext::new(name.as_str(), self.hooks.clone(), preloads);

        let result = match instance.extension_mut() {
            Some(extension) => guard(|| extension.initialize(&ctx)),
            None => Err(ExtensionError::failed("extension was never constructed")),
        };

        match result {
            Ok(()) => {
                instance.set_state(LifecycleState::Initialized);
                info!("✅ Extension {} v{} initialized", name, version);
                true
            }
            Err(e) => {
                report_failure(&name, "initialize", &e);
                instance.fail(ErrorState::InitializeFailed(e.to_string()));
                false
            }
        }
    }
}

/// Logs a failed transition at `error!` and where it was observed at
/// `debug!`. Panics carry their own location from the panic hook.
fn report_failure(name: &str, phase: &str, error: &ExtensionError) {
    error!(extension = name, "❌ Failed to {} extension: {}", phase, error);
    debug!(extension = name, "{}", failure_trace(name, phase, error, &Backtrace::capture()));
}

fn failure_trace(name: &str, phase: &str, error: &ExtensionError, backtrace: &Backtrace) -> String {
    format!("{} of {} failed: {}\nstack backtrace:\n{}", phase, name, error, backtrace)
}
