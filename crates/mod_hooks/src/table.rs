/// Hook table storage, registration and subscription management
use crate::callback::{HookCallback, Strategy, Subscriber, SubscriptionId};
use crate::stats::{HookStats, StatsCounters};
use crate::HookError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct HookEntry {
    pub strategy: Strategy,
    pub subscribers: Vec<Arc<Subscriber>>,
    /// Arguments of a latched broadcast, replayed to late subscribers
    pub latched: Option<Value>,
}

impl HookEntry {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            subscribers: Vec::new(),
            latched: None,
        }
    }
}

/// Keyed table of named extension points.
///
/// The table is shared through `Arc` between the host and every extension.
/// Subscribing and unsubscribing are allowed at any time, including from
/// inside a callback that is currently being dispatched: dispatch works on a
/// snapshot of the subscriber list and never holds a map guard while
/// subscriber code runs.
pub struct HookTable {
    /// Hook name to strategy and ordered subscribers
    pub(crate) hooks: DashMap<String, HookEntry>,
    /// Dispatch and failure counters
    pub(crate) stats: StatsCounters,
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("hooks", &self.hooks.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl HookTable {
    /// Creates an empty hook table.
    pub fn new() -> Self {
        Self {
            hooks: DashMap::new(),
            stats: StatsCounters::default(),
        }
    }

    /// Declares a hook with its strategy.
    ///
    /// Registering an existing hook again with the same strategy is a no-op;
    /// a different strategy is rejected.
    pub fn register(&self, hook: &str, strategy: Strategy) -> Result<(), HookError> {
        match self.hooks.entry(hook.to_string()) {
            Entry::Occupied(entry) => {
                let expected = entry.get().strategy;
                if expected != strategy {
                    return Err(HookError::StrategyMismatch {
                        hook: hook.to_string(),
                        expected,
                        requested: strategy,
                    });
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(HookEntry::new(strategy));
                debug!("🪝 Registered {} hook '{}'", strategy, hook);
            }
        }
        Ok(())
    }

    /// Strategy of a hook, if it exists.
    pub fn strategy(&self, hook: &str) -> Option<Strategy> {
        self.hooks.get(hook).map(|entry| entry.strategy)
    }

    /// Appends a subscriber to a hook, creating the hook with the callback's
    /// strategy when it does not exist yet.
    ///
    /// `owner` labels the subscriber in logs and lets the runtime drop every
    /// subscription of an extension at once. Subscribing to a latched
    /// broadcast hook invokes the callback immediately with the latched
    /// arguments.
    pub fn subscribe(
        &self,
        hook: &str,
        callback: HookCallback,
        owner: Option<&str>,
    ) -> Result<SubscriptionId, HookError> {
        let requested = callback.strategy();
        let subscriber = Arc::new(Subscriber {
            id: SubscriptionId::new(),
            owner: owner.map(str::to_string),
            callback,
        });

        let latched = {
            let mut entry = self
                .hooks
                .entry(hook.to_string())
                .or_insert_with(|| HookEntry::new(requested));
            if entry.strategy != requested {
                return Err(HookError::StrategyMismatch {
                    hook: hook.to_string(),
                    expected: entry.strategy,
                    requested,
                });
            }
            entry.subscribers.push(subscriber.clone());
            entry.latched.clone()
        };

        debug!("📝 Subscribed {} to hook '{}'", subscriber.label(), hook);

        if let Some(args) = latched {
            self.invoke_broadcast(hook, &subscriber, &args);
        }

        Ok(subscriber.id)
    }

    /// Removes one subscription. Returns false if it was not found.
    pub fn unsubscribe(&self, hook: &str, id: SubscriptionId) -> bool {
        let Some(mut entry) = self.hooks.get_mut(hook) else {
            return false;
        };
        let before = entry.subscribers.len();
        entry.subscribers.retain(|subscriber| subscriber.id != id);
        let removed = entry.subscribers.len() != before;
        if removed {
            debug!("Unsubscribed {} from hook '{}'", id, hook);
        }
        removed
    }

    /// Removes every subscription labelled with `owner`, across all hooks.
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        for mut entry in self.hooks.iter_mut() {
            let before = entry.subscribers.len();
            entry
                .subscribers
                .retain(|subscriber| subscriber.owner.as_deref() != Some(owner));
            removed += before - entry.subscribers.len();
        }
        if removed > 0 {
            info!("🧹 Removed {} hook subscriptions owned by {}", removed, owner);
        }
        removed
    }

    /// Number of subscribers currently attached to a hook.
    pub fn subscriber_count(&self, hook: &str) -> usize {
        self.hooks
            .get(hook)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    /// Names of every known hook, sorted.
    pub fn hook_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// True once [`HookTable::latch`] has fired for this hook.
    pub fn is_latched(&self, hook: &str) -> bool {
        self.hooks
            .get(hook)
            .map(|entry| entry.latched.is_some())
            .unwrap_or(false)
    }

    /// Current table statistics.
    pub fn stats(&self) -> HookStats {
        let total_subscribers = self.hooks.iter().map(|entry| entry.subscribers.len()).sum();
        HookStats {
            total_hooks: self.hooks.len(),
            total_subscribers,
            dispatches: self.stats.dispatches(),
            subscriber_failures: self.stats.failures(),
        }
    }

    /// Clones the subscriber list of a hook after checking its strategy.
    /// `Ok(None)` means the hook does not exist.
    pub(crate) fn snapshot(
        &self,
        hook: &str,
        requested: Strategy,
    ) -> Result<Option<Vec<Arc<Subscriber>>>, HookError> {
        let Some(entry) = self.hooks.get(hook) else {
            return Ok(None);
        };
        if entry.strategy != requested {
            return Err(HookError::StrategyMismatch {
                hook: hook.to_string(),
                expected: entry.strategy,
                requested,
            });
        }
        Ok(Some(entry.subscribers.clone()))
    }
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new()
    }
}
