//! Demo host for the mod runtime.
//!
//! Loads the configuration, discovers the bundled extensions, preloads their
//! resources from an in-memory world and then plays a short scripted session
//! through the hooks.

mod cli;
mod config;
mod demo;
mod logging;
mod progress_bar;
mod signals;

use anyhow::{anyhow, Context};
use cli::CliArgs;
use config::AppConfig;
use mod_hooks::{FieldStore, HookTable, HookedFields, MapFieldStore, Strategy};
use mod_loader::{ExtensionRegistry, ModRuntime, StartupReport};
use progress_bar::ProgressBar;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

struct Application {
    args: CliArgs,
    config: AppConfig,
}

impl Application {
    async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(batch_size) = args.batch_size {
            config.runtime.preload_batch_size = batch_size;
        }

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        logging::setup_logging(&config.logging)?;

        info!("🧩 Mod Host v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "📂 Config: {} | {} resource groups | batch size {}",
            args.config_path.display(),
            config.world.groups.len(),
            config.runtime.preload_batch_size
        );

        Ok(Self { args, config })
    }

    async fn run(self) -> anyhow::Result<()> {
        let hooks = Arc::new(HookTable::new());
        hooks.register(demo::TAKE_DAMAGE, Strategy::Chain)?;

        let store = MapFieldStore::new();
        for (name, value) in self.config.world.json_fields()? {
            store.set_field(&name, value);
        }
        let fields = Arc::new(HookedFields::new(Arc::new(store), hooks.clone())?);

        let (bar, progress) = ProgressBar::new();
        let renderer = progress_bar::spawn_renderer(progress);

        let registry = ExtensionRegistry::discover(demo::factories());
        let mut runtime = ModRuntime::new(registry, self.config.runtime.clone())
            .with_hooks(hooks.clone())
            .with_fields(fields.clone())
            .with_progress(Arc::new(bar));

        let host = self.config.world.to_host();
        let report = runtime
            .run_startup(&host, self.config.runtime.preload_batch_size)
            .await
            .context("startup failed")?;

        if let Err(e) = renderer.await {
            error!("❌ Progress renderer stopped unexpectedly: {}", e);
        }
        log_report(&report);

        play_session(&hooks, &fields)?;

        if self.args.once {
            signals::announce_quit(&hooks, "session finished")?;
        } else {
            info!("🛑 Press Ctrl+C to quit");
            signals::quit_on_signal(&hooks).await?;
        }

        let stats = hooks.stats();
        info!("📊 Final hook statistics:");
        info!("  - Hooks: {}", stats.total_hooks);
        info!("  - Subscribers: {}", stats.total_subscribers);
        info!("  - Dispatches: {}", stats.dispatches);
        info!("  - Subscriber failures: {}", stats.subscriber_failures);
        info!("💾 Extension settings: {:?}", runtime.enabled_settings());

        Ok(())
    }
}

fn log_report(report: &StartupReport) {
    for line in report.status_text.lines() {
        info!("{}", line);
    }
    info!(
        "📦 {} preloaded resources held for {} extensions",
        report.cache.len(),
        report.cache.extensions().count()
    );
}

/// A few hits and field reads, all routed through the hooks.
fn play_session(hooks: &HookTable, fields: &HookedFields) -> anyhow::Result<()> {
    let can_dash: bool = fields.get_as("can_dash")?;
    info!("🏃 can_dash = {}", can_dash);

    for source in ["crawler", "husk"] {
        let damage: i64 = hooks.chain_typed(demo::TAKE_DAMAGE, &json!({ "source": source }), 1)?;
        let health: i64 = fields.get_as("health")?;
        fields.set("health", json!(health - damage))?;
        info!(
            "🗡️ {} hits for {}, health {} -> {}",
            source,
            damage,
            health,
            fields.get("health")?
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }
}
