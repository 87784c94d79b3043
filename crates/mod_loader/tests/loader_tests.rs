//! Batched loader behaviour against the in-memory host.

use async_trait::async_trait;
use mod_loader::memory::MemoryGroup;
use mod_loader::planner::{plan_requests, PreloadPlan};
use mod_loader::{
    BatchedLoader, ExtensionError, GroupHook, HostError, MemoryHost, MemoryResource,
    ProgressSink, ResourceHandle, ResourceHost,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct ProgressLog(Mutex<Vec<f32>>);

impl ProgressSink for ProgressLog {
    fn report(&self, progress: f32) {
        self.0.lock().unwrap().push(progress);
    }
}

impl ProgressLog {
    fn values(&self) -> Vec<f32> {
        self.0.lock().unwrap().clone()
    }
}

fn declared(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(group, path)| (group.to_string(), path.to_string()))
        .collect()
}

fn plan_for(extensions: &[(&str, Vec<(String, String)>)]) -> PreloadPlan {
    plan_requests(
        extensions
            .iter()
            .map(|(name, requests)| (*name, requests.as_slice())),
    )
}

fn assert_monotonic(values: &[f32]) {
    assert!(!values.is_empty(), "no progress was reported");
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {:?}", values);
    }
    assert_eq!(values.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let mut host = MemoryHost::new().with_latency(Duration::from_millis(5));
    let mut requests = Vec::new();
    for i in 0..6 {
        let group = format!("Room_{}", i);
        host = host.with_paths(group.clone(), ["Door"]);
        requests.push((group, "Door".to_string()));
    }
    let plan = plan_for(&[("walker", requests)]);

    let cache = BatchedLoader::new(&host).load(&plan, 2).await;

    assert_eq!(host.peak_open(), 2);
    assert_eq!(host.currently_open(), 0);
    assert_eq!(cache.len(), 6);
}

#[tokio::test]
async fn test_largest_groups_start_first() {
    let host = MemoryHost::new()
        .with_paths("Small", ["A"])
        .with_paths("Large", ["A", "B", "C"])
        .with_paths("Medium", ["A", "B"])
        .with_paths("AlsoSmall", ["A"]);
    let plan = plan_for(&[(
        "collector",
        declared(&[
            ("Small", "A"),
            ("Large", "A"),
            ("Large", "B"),
            ("Large", "C"),
            ("Medium", "A"),
            ("Medium", "B"),
            ("AlsoSmall", "A"),
        ]),
    )]);

    BatchedLoader::new(&host).load(&plan, 1).await;

    assert_eq!(
        host.open_log().await,
        vec!["Large", "Medium", "Small", "AlsoSmall"]
    );
    assert_eq!(host.peak_open(), 1);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let host = MemoryHost::new()
        .with_latency(Duration::from_millis(2))
        .with_paths("One", ["A"])
        .with_paths("Two", ["A"])
        .with_paths("Three", ["A"]);
    let plan = plan_for(&[(
        "reader",
        declared(&[("One", "A"), ("Two", "A"), ("Three", "A")]),
    )]);
    let progress = Arc::new(ProgressLog::default());

    BatchedLoader::new(&host)
        .with_progress(progress.clone())
        .load(&plan, 2)
        .await;

    let values = progress.values();
    assert_monotonic(&values);
    // Three groups, two milestones each.
    assert_eq!(values.len(), 6);
}

#[tokio::test]
async fn test_empty_plan_completes_immediately() {
    let host = MemoryHost::new();
    let progress = Arc::new(ProgressLog::default());

    let cache = BatchedLoader::new(&host)
        .with_progress(progress.clone())
        .load(&PreloadPlan::default(), 3)
        .await;

    assert!(cache.is_empty());
    assert_eq!(progress.values(), vec![1.0]);
    assert!(host.open_log().await.is_empty());
}

#[tokio::test]
async fn test_zero_limit_is_clamped() {
    let host = MemoryHost::new()
        .with_paths("One", ["A"])
        .with_paths("Two", ["A"]);
    let plan = plan_for(&[("reader", declared(&[("One", "A"), ("Two", "A")]))]);

    let cache = BatchedLoader::new(&host).load(&plan, 0).await;

    assert_eq!(cache.len(), 2);
    assert_eq!(host.peak_open(), 1);
}

#[tokio::test]
async fn test_failed_open_contributes_nothing() {
    let host = MemoryHost::new()
        .with_paths("Broken", ["A"])
        .with_paths("Fine", ["A"])
        .fail_open("Broken");
    let plan = plan_for(&[("reader", declared(&[("Broken", "A"), ("Fine", "A")]))]);
    let progress = Arc::new(ProgressLog::default());

    let cache = BatchedLoader::new(&host)
        .with_progress(progress.clone())
        .load(&plan, 1)
        .await;

    assert!(cache.get("reader", "Broken", "A").is_none());
    assert!(cache.get("reader", "Fine", "A").is_some());
    assert_monotonic(&progress.values());
    assert_eq!(host.currently_open(), 0);
}

#[tokio::test]
async fn test_failed_close_keeps_entries() {
    let host = MemoryHost::new()
        .with_paths("Sticky", ["A", "B"])
        .fail_close("Sticky");
    let plan = plan_for(&[("reader", declared(&[("Sticky", "A"), ("Sticky", "B")]))]);
    let progress = Arc::new(ProgressLog::default());

    let cache = BatchedLoader::new(&host)
        .with_progress(progress.clone())
        .load(&plan, 1)
        .await;

    assert_eq!(cache.len(), 2);
    assert_monotonic(&progress.values());
}

#[tokio::test]
async fn test_unknown_group_is_skipped() {
    let host = MemoryHost::new().with_paths("Known", ["A"]);
    let plan = plan_for(&[("reader", declared(&[("Unknown", "A"), ("Known", "A")]))]);

    let cache = BatchedLoader::new(&host).load(&plan, 2).await;
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_nested_paths_and_malformed_requests() {
    let host = MemoryHost::new().with_group(
        "Tutorial_01",
        vec![
            MemoryResource::new("Crawler").with_child(MemoryResource::new("Shell")),
            MemoryResource::new("Gate"),
        ],
    );
    let plan = plan_for(&[(
        "finder",
        declared(&[
            ("Tutorial_01", "Crawler/Shell"),
            ("Tutorial_01", "Gate"),
            ("Tutorial_01", "/Gate"),
            ("Tutorial_01", "Gate/"),
            ("Tutorial_01", "Crawler/Missing"),
            ("Tutorial_01", "Nothing"),
        ]),
    )]);

    // Malformed paths never reach the loader.
    assert_eq!(plan.total_requests(), 4);

    let cache = BatchedLoader::new(&host).load(&plan, 1).await;
    assert_eq!(cache.len(), 2);

    let shell = cache
        .get("finder", "Tutorial_01", "Crawler/Shell")
        .and_then(|handle| handle.downcast_ref::<MemoryResource>())
        .expect("nested resource should be cached");
    assert_eq!(shell.name, "Shell");
    assert!(!shell.active);
    assert!(shell.persistent);
}

#[tokio::test]
async fn test_only_malformed_requests_yield_empty_cache() {
    let host = MemoryHost::new().with_paths("Town", ["Elderbug"]);
    let plan = plan_for(&[("careless", declared(&[("Town", "/Elderbug"), ("Town", "Elderbug/")]))]);

    assert!(plan.is_empty());
    let cache = BatchedLoader::new(&host).load(&plan, 1).await;
    assert!(cache.is_empty());
    assert!(host.open_log().await.is_empty());
}

/// Memory host whose child lookup crashes.
struct BrittleHost {
    inner: MemoryHost,
}

#[async_trait]
impl ResourceHost for BrittleHost {
    type Group = MemoryGroup;

    async fn open_group(&self, name: &str) -> Result<MemoryGroup, HostError> {
        self.inner.open_group(name).await
    }

    async fn close_group(&self, group: MemoryGroup) -> Result<(), HostError> {
        self.inner.close_group(group).await
    }

    fn top_level_resources(&self, group: &MemoryGroup) -> Vec<ResourceHandle> {
        self.inner.top_level_resources(group)
    }

    fn find_child(&self, _resource: &ResourceHandle, path: &str) -> Option<ResourceHandle> {
        panic!("child lookup of {} crashed", path)
    }

    fn persist_clone(&self, resource: &ResourceHandle) -> ResourceHandle {
        self.inner.persist_clone(resource)
    }
}

#[tokio::test]
async fn test_host_panic_while_reading_skips_group_and_closes_it() {
    let host = BrittleHost {
        inner: MemoryHost::new()
            .with_paths("Fragile", ["A/B"])
            .with_paths("Sturdy", ["C"]),
    };
    let plan = plan_for(&[(
        "reader",
        declared(&[("Fragile", "A"), ("Fragile", "A/B"), ("Sturdy", "C")]),
    )]);
    let progress = Arc::new(ProgressLog::default());

    let cache = BatchedLoader::new(&host)
        .with_progress(progress.clone())
        .load(&plan, 1)
        .await;

    assert!(cache.get("reader", "Fragile", "A").is_none());
    assert!(cache.get("reader", "Sturdy", "C").is_some());
    assert_eq!(cache.len(), 1);
    assert_eq!(host.inner.currently_open(), 0);
    assert_monotonic(&progress.values());
}

#[tokio::test]
async fn test_group_hooks_run_while_group_is_open() {
    let host = MemoryHost::new()
        .with_paths("Town", ["Elderbug", "Bench"])
        .with_paths("Colosseum", ["Gate", "Cage/Fool"]);
    let mut plan = plan_for(&[("shop", declared(&[("Town", "Bench")]))]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    plan.add_group_hook(
        "arena",
        GroupHook::new("Colosseum", move |roots| {
            let mut names: Vec<String> = roots.iter().map(|r| r.name().to_string()).collect();
            names.sort();
            sink.lock().unwrap().extend(names);
            Ok(())
        }),
    );
    plan.add_group_hook(
        "arena",
        GroupHook::new("Colosseum", |_| Err(ExtensionError::failed("no fools today"))),
    );
    plan.add_group_hook("broken", GroupHook::new("Town", |_| panic!("hook exploded")));

    let cache = BatchedLoader::new(&host).load(&plan, 1).await;

    // Hook-only groups are opened, after the groups with requests.
    assert_eq!(host.open_log().await, vec!["Town", "Colosseum"]);
    assert_eq!(*seen.lock().unwrap(), vec!["Cage", "Gate"]);
    // A failing hook does not cost the group its resources.
    assert!(cache.get("shop", "Town", "Bench").is_some());
    assert_eq!(cache.len(), 1);
    assert_eq!(host.currently_open(), 0);
}
