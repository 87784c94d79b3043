//! The runtime context that owns the registry and the hook table.

use crate::cache::ResourceCache;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::host::ResourceHost;
use crate::lifecycle::LifecycleExecutor;
use crate::loader::BatchedLoader;
use crate::planner;
use crate::progress::{NullProgress, ProgressSink};
use crate::registry::{ExtensionInstance, ExtensionRegistry, LifecycleState};
use crate::status::{self, ExtensionStatus, LogStatus, StatusSink};
use crate::warmup::Warmup;
use mod_hooks::{names, HookTable, HookedFields};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Startup milestones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadState {
    pub started: bool,
    pub preloaded: bool,
    pub loaded: bool,
}

/// Result of [`ModRuntime::run_startup`].
#[derive(Debug)]
pub struct StartupReport {
    pub cache: ResourceCache,
    pub statuses: Vec<ExtensionStatus>,
    pub status_text: String,
    /// Extensions that reached `Initialized`, in the order they did
    pub initialized: Vec<String>,
}

/// Explicitly constructed runtime: one per host.
pub struct ModRuntime {
    registry: ExtensionRegistry,
    hooks: Arc<HookTable>,
    status: Arc<dyn StatusSink>,
    progress: Arc<dyn ProgressSink>,
    fields: Option<Arc<HookedFields>>,
    config: RuntimeConfig,
    load_state: LoadState,
}

impl ModRuntime {
    pub fn new(registry: ExtensionRegistry, config: RuntimeConfig) -> Self {
        Self {
            registry,
            hooks: Arc::new(HookTable::new()),
            status: Arc::new(LogStatus),
            progress: Arc::new(NullProgress),
            fields: None,
            config,
            load_state: LoadState::default(),
        }
    }

    /// Shares an existing hook table instead of a fresh one.
    pub fn with_hooks(mut self, hooks: Arc<HookTable>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Field capability whose catalog is warmed during startup.
    pub fn with_fields(mut self, fields: Arc<HookedFields>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn hooks(&self) -> Arc<HookTable> {
        self.hooks.clone()
    }

    pub fn fields(&self) -> Option<Arc<HookedFields>> {
        self.fields.clone()
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn instance(&self, name: &str) -> Option<&ExtensionInstance> {
        self.registry.get(name)
    }

    /// Extensions in priority order, optionally only enabled ones and
    /// optionally including failed ones.
    pub fn extensions(&self, only_enabled: bool, allow_errors: bool) -> Vec<&ExtensionInstance> {
        self.registry
            .in_priority_order()
            .into_iter()
            .filter(|instance| !only_enabled || instance.enabled())
            .filter(|instance| allow_errors || instance.error_state().is_none())
            .collect()
    }

    /// Name to enabled flag of every extension that did not fail, for the
    /// host to persist.
    pub fn enabled_settings(&self) -> BTreeMap<String, bool> {
        self.registry
            .iter()
            .filter(|instance| instance.error_state().is_none())
            .map(|instance| (instance.name().to_string(), instance.enabled()))
            .collect()
    }

    pub fn status_text(&self) -> String {
        status::render(&status::summary(&self.registry), &self.registry)
    }

    fn executor(&self) -> LifecycleExecutor {
        LifecycleExecutor::new(self.hooks.clone(), self.status.clone())
    }

    /// Constructs, preloads and initializes every discovered extension.
    ///
    /// The phases run strictly in order:
    ///
    /// 1. The field catalog warm-up starts in the background.
    /// 2. Extensions are constructed in priority order and their resource
    ///    requests and group hooks collected.
    /// 3. The requests of constructed extensions are preloaded through
    ///    [`BatchedLoader`].
    /// 4. After the warm-up has finished, every constructed extension is
    ///    initialized in priority order with its own slice of the cache.
    /// 5. Extensions listed in [`RuntimeConfig::disabled_extensions`] are
    ///    toggled off and [`names::FINISHED_LOADING`] is latched.
    ///
    /// Extension failures are recorded per extension and reflected in the
    /// report; they never abort startup.
    ///
    /// # Arguments
    ///
    /// * `host` - Owner of the resource groups to preload from
    /// * `concurrency_limit` - Maximum number of groups open at once
    ///
    /// # Returns
    ///
    /// The [`StartupReport`], or [`RuntimeError::AlreadyStarted`] when called
    /// a second time.
    ///
    /// # Example
    ///
    /// ```
    /// use mod_loader::{ExtensionRegistry, MemoryHost, ModRuntime, RuntimeConfig};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let mut runtime = ModRuntime::new(ExtensionRegistry::discover(Vec::new()), RuntimeConfig::default());
    /// let report = runtime.run_startup(&MemoryHost::new(), 4).await.unwrap();
    /// assert!(report.initialized.is_empty());
    /// assert!(runtime.run_startup(&MemoryHost::new(), 4).await.is_err());
    /// # });
    /// ```
    pub async fn run_startup<H: ResourceHost>(
        &mut self,
        host: &H,
        concurrency_limit: usize,
    ) -> Result<StartupReport, RuntimeError> {
        if self.load_state.started {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.load_state.started = true;

        let started = Instant::now();
        info!(
            "🚀 Starting mod runtime with {} discovered extensions",
            self.registry.len()
        );

        let warmup = Warmup::spawn(self.fields.as_deref());
        let executor = self.executor();
        let order = self.registry.names_in_priority_order();

        // Phase 1: construct and collect resource requests
        info!("Phase 1: Constructing extensions");
        for name in &order {
            executor.construct(&mut self.registry, name);
        }

        // Phase 2: preload
        info!("Phase 2: Preloading resources");
        let plan = planner::plan(
            order
                .iter()
                .filter_map(|name| self.registry.get(name))
                .filter(|instance| instance.state() == &LifecycleState::Constructed),
        );
        let cache = BatchedLoader::new(host)
            .with_progress(self.progress.clone())
            .load(&plan, concurrency_limit)
            .await;
        self.load_state.preloaded = true;

        warmup.wait().await;

        // Phase 3: initialize in priority order
        info!("Phase 3: Initializing extensions");
        let mut initialized = Vec::new();
        for name in &order {
            if executor.initialize(&mut self.registry, name, Some(cache.slice(name))) {
                initialized.push(name.clone());
            }
        }

        self.apply_disabled(&executor);
        self.load_state.loaded = true;

        if let Err(e) = self.hooks.latch(
            names::FINISHED_LOADING,
            json!({ "extensions": initialized.clone() }),
        ) {
            warn!("⚠️ Could not announce finished loading: {}", e);
        }

        let statuses = status::snapshot(&self.registry);
        let failed = statuses.iter().filter(|s| s.error.is_some()).count();
        if failed > 0 {
            warn!("Failed to load {} extensions", failed);
            for status in statuses.iter().filter(|s| s.error.is_some()) {
                warn!("  {}: {}", status.name, status.error.as_deref().unwrap_or_default());
            }
        }
        info!(
            "✅ Startup complete: {} of {} extensions initialized in {:.2}s",
            initialized.len(),
            self.registry.len(),
            started.elapsed().as_secs_f32()
        );

        Ok(StartupReport {
            cache,
            status_text: self.status_text(),
            statuses,
            initialized,
        })
    }

    pub fn toggle_on(&mut self, name: &str) -> Result<bool, RuntimeError> {
        self.executor().toggle_on(&mut self.registry, name)
    }

    pub fn toggle_off(&mut self, name: &str) -> Result<bool, RuntimeError> {
        self.executor().toggle_off(&mut self.registry, name)
    }

    fn apply_disabled(&mut self, executor: &LifecycleExecutor) {
        for name in &self.config.disabled_extensions {
            match executor.toggle_off(&mut self.registry, name) {
                Ok(true) => info!("Extension {} disabled by configuration", name),
                Ok(false) => debug!("Extension {} cannot be disabled by configuration", name),
                Err(e) => debug!("Ignoring disabled extension setting: {}", e),
            }
        }
    }
}
