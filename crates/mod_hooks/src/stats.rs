use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of hook table activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookStats {
    /// Number of hooks that exist (registered or subscribed to)
    pub total_hooks: usize,
    /// Number of live subscriptions across all hooks
    pub total_subscribers: usize,
    /// Dispatches that reached at least the subscriber snapshot
    pub dispatches: u64,
    /// Subscriber invocations that returned an error or panicked
    pub subscriber_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    dispatches: AtomicU64,
    failures: AtomicU64,
}

impl StatsCounters {
    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
