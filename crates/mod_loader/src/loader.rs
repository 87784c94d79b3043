//! Bounded-concurrency preloading of resource groups.

use crate::cache::ResourceCache;
use crate::host::{ResourceHandle, ResourceHost};
use crate::planner::{GroupPlan, PreloadPlan};
use crate::progress::{NullProgress, ProgressSink, ProgressTracker, DONE, OPENED};
use crate::request::ResourceRequest;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use mod_hooks::panic_message;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A resource copied out of an open group.
struct Extracted {
    extension: String,
    group: String,
    path: String,
    handle: ResourceHandle,
}

/// Opens each planned group, copies the requested resources out and closes
/// the group, keeping at most `concurrency_limit` groups in flight.
pub struct BatchedLoader<'h, H: ResourceHost> {
    host: &'h H,
    progress: Arc<dyn ProgressSink>,
}

impl<'h, H: ResourceHost> BatchedLoader<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self {
            host,
            progress: Arc::new(NullProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs every group of `plan` and returns the populated cache.
    ///
    /// Groups are started largest first (ties in plan order). Each group is
    /// opened, its group hooks run against the top-level resources, the
    /// requested resources are copied out with `persist_clone`, and the group
    /// is closed again.
    ///
    /// A group that fails to open contributes nothing. A group that fails to
    /// close keeps what was already extracted. If the host panics while the
    /// group is being read, the group contributes nothing but is still
    /// closed. In every case its progress is completed.
    ///
    /// # Arguments
    ///
    /// * `plan` - Groups to load, usually built by [`crate::planner::plan`]
    /// * `concurrency_limit` - Maximum number of groups open at once; 0 is
    ///   treated as 1
    ///
    /// # Returns
    ///
    /// The cache of every resource that could be found, keyed by extension.
    ///
    /// # Example
    ///
    /// ```
    /// use mod_loader::planner::plan_requests;
    /// use mod_loader::{BatchedLoader, MemoryHost};
    ///
    /// # tokio_test_block(async {
    /// let host = MemoryHost::new().with_paths("Town", ["Elderbug", "Bench"]);
    /// let wanted = vec![("Town".to_string(), "Bench".to_string())];
    /// let plan = plan_requests(vec![("rest_stop", wanted.as_slice())]);
    ///
    /// let cache = BatchedLoader::new(&host).load(&plan, 2).await;
    /// assert!(cache.get("rest_stop", "Town", "Bench").is_some());
    /// # });
    /// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
    /// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
    /// # }
    /// ```
    pub async fn load(&self, plan: &PreloadPlan, concurrency_limit: usize) -> ResourceCache {
        let limit = if concurrency_limit == 0 {
            warn!("⚠️ Preload concurrency limit of 0 is invalid, using 1");
            1
        } else {
            concurrency_limit
        };

        let mut queue: Vec<&GroupPlan> = plan.groups().iter().collect();
        queue.sort_by(|a, b| b.work_size().cmp(&a.work_size()));

        let started = Instant::now();
        info!(
            "📦 Preloading {} resources from {} groups, {} at a time",
            plan.total_requests(),
            queue.len(),
            limit
        );

        let tracker = ProgressTracker::new(queue.len(), self.progress.clone());
        let mut cache = ResourceCache::new();
        let mut pending = queue.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < limit {
                match pending.next() {
                    Some((slot, group)) => in_flight.push(self.run_group(slot, group, &tracker)),
                    None => break,
                }
            }

            match in_flight.next().await {
                Some(extracted) => {
                    for item in extracted {
                        cache.insert(item.extension, item.group, item.path, item.handle);
                    }
                }
                None => break,
            }
        }

        tracker.finish().await;
        info!(
            "✅ Preloaded {} resources in {:.2}s",
            cache.len(),
            started.elapsed().as_secs_f32()
        );
        cache
    }

    async fn run_group(
        &self,
        slot: usize,
        group: &GroupPlan,
        tracker: &ProgressTracker,
    ) -> Vec<Extracted> {
        debug!("Loading group {}", group.name());

        let opened = AssertUnwindSafe(self.host.open_group(group.name()))
            .catch_unwind()
            .await;
        let handle = match opened {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("❌ {}", e);
                tracker.advance(slot, DONE).await;
                return Vec::new();
            }
            Err(payload) => {
                error!(
                    "❌ Host panicked while opening group {}: {}",
                    group.name(),
                    panic_message(payload.as_ref())
                );
                tracker.advance(slot, DONE).await;
                return Vec::new();
            }
        };
        tracker.advance(slot, OPENED).await;

        // The group has to be closed whatever happens while reading it.
        let read = catch_unwind(AssertUnwindSafe(|| {
            let roots = self.host.top_level_resources(&handle);
            self.run_hooks(group, &roots);
            self.extract(group, &roots)
        }));
        let extracted = match read {
            Ok(extracted) => extracted,
            Err(payload) => {
                error!(
                    "❌ Host panicked while reading group {}, skipping its resources: {}",
                    group.name(),
                    panic_message(payload.as_ref())
                );
                Vec::new()
            }
        };

        debug!("Unloading group {}", group.name());
        match AssertUnwindSafe(self.host.close_group(handle)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("❌ {}", e),
            Err(payload) => error!(
                "❌ Host panicked while closing group {}: {}",
                group.name(),
                panic_message(payload.as_ref())
            ),
        }
        tracker.advance(slot, DONE).await;

        extracted
    }

    fn run_hooks(&self, group: &GroupPlan, roots: &[ResourceHandle]) {
        for (extension, hook) in group.hooks() {
            if let Err(e) = hook.run(roots) {
                error!(
                    extension = extension.as_str(),
                    "❌ Group hook for {} failed: {}",
                    group.name(),
                    e
                );
            }
        }
    }

    fn extract(&self, group: &GroupPlan, roots: &[ResourceHandle]) -> Vec<Extracted> {
        let mut extracted = Vec::new();

        for (extension, requests) in group.entries() {
            for request in requests {
                match self.locate(roots, request) {
                    Some(found) => extracted.push(Extracted {
                        extension: extension.clone(),
                        group: group.name().to_string(),
                        path: request.path().to_string(),
                        handle: self.host.persist_clone(&found),
                    }),
                    None => warn!(
                        "⚠️ Could not find resource {} in group {}, requested by {}",
                        request.path(),
                        group.name(),
                        extension
                    ),
                }
            }
        }
        extracted
    }

    fn locate(&self, roots: &[ResourceHandle], request: &ResourceRequest) -> Option<ResourceHandle> {
        let root = roots.iter().find(|resource| resource.name() == request.root())?;
        match request.child() {
            Some(child) => self.host.find_child(root, child),
            None => Some(root.clone()),
        }
    }
}
