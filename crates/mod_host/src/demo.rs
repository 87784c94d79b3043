//! Extensions bundled with the demo host.

use mod_hooks::{names, HookCallback, SubscriptionId};
use mod_loader::{
    Extension, ExtensionContext, ExtensionError, ExtensionFactory, GroupHook, MemoryResource,
    SimpleExtensionFactory,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Chain hook the host runs on every hit the player takes.
pub const TAKE_DAMAGE: &str = "take_damage";

#[derive(Debug, Deserialize)]
pub struct DamageArgs {
    pub source: String,
}

/// Every extension the demo host ships with.
pub fn factories() -> Vec<Box<dyn ExtensionFactory>> {
    vec![
        SimpleExtensionFactory::new("announcer", 0, Announcer::default).boxed(),
        SimpleExtensionFactory::new("bestiary", 1, Bestiary::default).boxed(),
        SimpleExtensionFactory::new("dash_unlock", 5, DashUnlock::default).boxed(),
        SimpleExtensionFactory::new("hard_mode", 10, HardMode::default).boxed(),
        SimpleExtensionFactory::new("unstable", 20, || Unstable).boxed(),
    ]
}

/// Logs the startup and shutdown milestones.
#[derive(Default)]
pub struct Announcer;

impl Extension for Announcer {
    fn version(&self) -> &str {
        "1.0.0"
    }

    fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        ctx.subscribe(
            names::FINISHED_LOADING,
            HookCallback::broadcast(|args| {
                let count = args["extensions"].as_array().map(Vec::len).unwrap_or(0);
                info!("📣 {} extensions are ready", count);
                Ok(())
            }),
        )?;
        ctx.subscribe(
            names::APPLICATION_QUIT,
            HookCallback::broadcast(|args| {
                let reason = args["reason"].as_str().unwrap_or("unknown");
                info!("📣 Farewell, knight ({})", reason);
                Ok(())
            }),
        )?;
        Ok(())
    }
}

/// Catalogues the creatures it preloaded.
#[derive(Default)]
pub struct Bestiary {
    entries: Vec<String>,
}

impl Extension for Bestiary {
    fn version(&self) -> &str {
        "0.4.2"
    }

    fn resource_requests(&self) -> Vec<(String, String)> {
        [
            ("Tutorial_01", "Crawler"),
            ("Tutorial_01", "Crawler/Shell"),
            ("Crossroads", "Husk/Shield"),
            ("Crossroads", "Mosscreep"),
        ]
        .iter()
        .map(|(group, path)| (group.to_string(), path.to_string()))
        .collect()
    }

    /// Takes a census of the town without keeping anything from it.
    fn group_hooks(&self) -> Vec<GroupHook> {
        vec![GroupHook::new("Town", |roots| {
            info!("📖 Bestiary counted {} residents in Town", roots.len());
            Ok(())
        })]
    }

    fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let Some(preloads) = ctx.preloads() else {
            return Ok(());
        };

        for group in preloads.group_names() {
            for handle in preloads.group(group).into_iter().flat_map(|g| g.values()) {
                if let Some(resource) = handle.downcast_ref::<MemoryResource>() {
                    self.entries.push(format!("{}:{}", group, resource.name));
                }
            }
        }
        self.entries.sort();
        info!("📖 Bestiary catalogued {} creatures: {:?}", self.entries.len(), self.entries);
        Ok(())
    }
}

/// Grants dash from the start. Can be toggled at runtime.
#[derive(Default)]
pub struct DashUnlock {
    subscription: Option<SubscriptionId>,
}

impl Extension for DashUnlock {
    fn version(&self) -> &str {
        "2.1.0"
    }

    fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        let id = ctx.subscribe(
            names::GET_FIELD,
            HookCallback::overriding(|args, baseline| {
                if args["field"] == "can_dash" {
                    Ok(Value::Bool(true))
                } else {
                    Ok(baseline.clone())
                }
            }),
        )?;
        self.subscription = Some(id);
        Ok(())
    }

    fn is_toggleable(&self) -> bool {
        true
    }

    fn unload(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        if let Some(id) = self.subscription.take() {
            ctx.hooks().unsubscribe(names::GET_FIELD, id);
        }
        Ok(())
    }
}

/// Doubles incoming damage and refuses to let health go negative.
#[derive(Default)]
pub struct HardMode;

impl Extension for HardMode {
    fn version(&self) -> &str {
        "1.3.0"
    }

    fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        ctx.subscribe(
            TAKE_DAMAGE,
            HookCallback::on_chain_typed(|args, damage: i64| {
                let source: DamageArgs = serde_json::from_value(args.clone())?;
                info!("💢 Hard mode doubles the hit from {}", source.source);
                Ok(damage * 2)
            }),
        )?;
        ctx.subscribe(
            names::SET_FIELD,
            HookCallback::chain(|args, value| {
                if args["field"] == "health" {
                    Ok(json!(value.as_i64().unwrap_or(0).max(0)))
                } else {
                    Ok(value)
                }
            }),
        )?;
        Ok(())
    }
}

/// Fails during initialization; the host keeps running without it.
pub struct Unstable;

impl Extension for Unstable {
    fn version(&self) -> &str {
        "0.0.1"
    }

    fn resource_requests(&self) -> Vec<(String, String)> {
        vec![("Town".to_string(), "Sly".to_string())]
    }

    fn initialize(&mut self, ctx: &ExtensionContext) -> Result<(), ExtensionError> {
        if ctx.preloads().map_or(true, |p| p.get("Town", "Sly").is_none()) {
            warn!("Unstable extension could not find its shopkeeper");
            return Err(ExtensionError::failed("required resource Town/Sly is missing"));
        }
        Ok(())
    }
}
