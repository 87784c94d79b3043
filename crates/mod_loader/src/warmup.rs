use mod_hooks::HookedFields;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How the field catalog warm-up ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupOutcome {
    /// No field capability was configured.
    Skipped,
    /// Catalog built with this many fields.
    Completed(usize),
    /// The task died; the catalog fills lazily on first use.
    Abandoned,
}

/// One-shot background task that fills the field catalog while extensions
/// are constructed and resources preloaded.
pub struct Warmup {
    handle: Option<JoinHandle<usize>>,
}

impl Warmup {
    /// Starts the warm-up on the blocking pool.
    pub fn spawn(fields: Option<&HookedFields>) -> Self {
        let Some(fields) = fields else {
            return Self { handle: None };
        };
        let catalog = fields.catalog();
        let store = fields.store();
        debug!("Starting field catalog warm-up");
        let handle = tokio::task::spawn_blocking(move || catalog.warm(store.as_ref()));
        Self {
            handle: Some(handle),
        }
    }

    /// Waits for the warm-up to finish.
    pub async fn wait(self) -> WarmupOutcome {
        let Some(handle) = self.handle else {
            return WarmupOutcome::Skipped;
        };
        match handle.await {
            Ok(count) => {
                debug!("Field catalog warmed with {} fields", count);
                WarmupOutcome::Completed(count)
            }
            Err(e) => {
                warn!("⚠️ Field catalog warm-up abandoned: {}", e);
                WarmupOutcome::Abandoned
            }
        }
    }
}
