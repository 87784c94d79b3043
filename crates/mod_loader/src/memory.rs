//! In-memory [`ResourceHost`] backed by resource trees.

use crate::error::HostError;
use crate::host::{ResourceHandle, ResourceHost};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

/// A node in a resource tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryResource {
    pub name: String,
    pub payload: Value,
    pub children: Vec<MemoryResource>,
    /// Live resources belong to an open group; persisted clones are inert.
    pub active: bool,
    pub persistent: bool,
}

impl MemoryResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
            children: Vec::new(),
            active: true,
            persistent: false,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_child(mut self, child: MemoryResource) -> Self {
        self.children.push(child);
        self
    }

    /// Builds top-level trees from slash-separated paths such as
    /// `"Crawler/Shell"`. Intermediate nodes are created as needed.
    pub fn forest<I, S>(paths: I) -> Vec<MemoryResource>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roots: Vec<MemoryResource> = Vec::new();
        for path in paths {
            let mut level = &mut roots;
            for segment in path.as_ref().split('/').filter(|s| !s.is_empty()) {
                let index = match level.iter().position(|node| node.name == segment) {
                    Some(index) => index,
                    None => {
                        level.push(MemoryResource::new(segment));
                        level.len() - 1
                    }
                };
                level = &mut level[index].children;
            }
        }
        roots
    }

    /// Descends through `path` one segment at a time.
    pub fn find(&self, path: &str) -> Option<&MemoryResource> {
        path.split('/').try_fold(self, |node, segment| {
            node.children.iter().find(|child| child.name == segment)
        })
    }
}

/// An open group of a [`MemoryHost`].
#[derive(Debug)]
pub struct MemoryGroup {
    name: String,
    roots: Vec<MemoryResource>,
}

impl MemoryGroup {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Resource host that serves groups from memory.
///
/// Records how many groups are open at once and can be told to fail opening
/// or closing specific groups.
#[derive(Debug, Default)]
pub struct MemoryHost {
    groups: HashMap<String, Vec<MemoryResource>>,
    failing_opens: HashSet<String>,
    failing_closes: HashSet<String>,
    latency: Duration,
    open_now: AtomicUsize,
    peak_open: AtomicUsize,
    opened: Mutex<Vec<String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, name: impl Into<String>, roots: Vec<MemoryResource>) -> Self {
        self.groups.insert(name.into(), roots);
        self
    }

    /// Adds a group built with [`MemoryResource::forest`].
    pub fn with_paths<I, S>(self, name: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_group(name, MemoryResource::forest(paths))
    }

    pub fn fail_open(mut self, group: impl Into<String>) -> Self {
        self.failing_opens.insert(group.into());
        self
    }

    pub fn fail_close(mut self, group: impl Into<String>) -> Self {
        self.failing_closes.insert(group.into());
        self
    }

    /// Simulated time spent in each open and close.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Highest number of groups that were open at the same time.
    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    pub fn currently_open(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }

    /// Group names in the order they were opened.
    pub async fn open_log(&self) -> Vec<String> {
        self.opened.lock().await.clone()
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort();
        names
    }

    async fn pause(&self) {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn handle(resource: &MemoryResource) -> ResourceHandle {
        ResourceHandle::new(resource.name.clone(), resource.clone())
    }
}

#[async_trait]
impl ResourceHost for MemoryHost {
    type Group = MemoryGroup;

    async fn open_group(&self, name: &str) -> Result<MemoryGroup, HostError> {
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_open.fetch_max(now, Ordering::SeqCst);
        self.opened.lock().await.push(name.to_string());
        self.pause().await;

        let roots = if self.failing_opens.contains(name) {
            None
        } else {
            self.groups.get(name).cloned()
        };

        match roots {
            Some(roots) => {
                trace!("Opened group {}", name);
                Ok(MemoryGroup {
                    name: name.to_string(),
                    roots,
                })
            }
            None => {
                self.open_now.fetch_sub(1, Ordering::SeqCst);
                if self.failing_opens.contains(name) {
                    Err(HostError::OpenFailed {
                        group: name.to_string(),
                        reason: "simulated open failure".to_string(),
                    })
                } else {
                    Err(HostError::UnknownGroup(name.to_string()))
                }
            }
        }
    }

    async fn close_group(&self, group: MemoryGroup) -> Result<(), HostError> {
        self.pause().await;
        self.open_now.fetch_sub(1, Ordering::SeqCst);
        trace!("Closed group {}", group.name);

        if self.failing_closes.contains(&group.name) {
            return Err(HostError::CloseFailed {
                group: group.name,
                reason: "simulated close failure".to_string(),
            });
        }
        Ok(())
    }

    fn top_level_resources(&self, group: &MemoryGroup) -> Vec<ResourceHandle> {
        group.roots.iter().map(Self::handle).collect()
    }

    fn find_child(&self, resource: &ResourceHandle, path: &str) -> Option<ResourceHandle> {
        let node = resource.downcast_ref::<MemoryResource>()?;
        node.find(path).map(Self::handle)
    }

    fn persist_clone(&self, resource: &ResourceHandle) -> ResourceHandle {
        match resource.downcast_ref::<MemoryResource>() {
            Some(node) => {
                let mut copy = node.clone();
                copy.active = false;
                copy.persistent = true;
                ResourceHandle::new(copy.name.clone(), copy)
            }
            None => resource.clone(),
        }
    }
}
