//! The host collaborator that owns resource groups.

use crate::error::HostError;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque, cheaply clonable reference to a host resource.
#[derive(Clone)]
pub struct ResourceHandle {
    name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ResourceHandle {
    pub fn new<T: Any + Send + Sync>(name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// True if both handles point at the same underlying resource.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle").field("name", &self.name).finish()
    }
}

/// Loads and unloads named resource groups on behalf of the loader.
///
/// `open_group` and `close_group` are the only suspension points of a
/// preload. The synchronous methods run while the group is open.
#[async_trait]
pub trait ResourceHost: Send + Sync {
    /// An open group. Consumed by `close_group`.
    type Group: Send;

    async fn open_group(&self, name: &str) -> Result<Self::Group, HostError>;

    async fn close_group(&self, group: Self::Group) -> Result<(), HostError>;

    /// Resources at the top level of an open group.
    fn top_level_resources(&self, group: &Self::Group) -> Vec<ResourceHandle>;

    /// Looks up `path` below `resource`.
    fn find_child(&self, resource: &ResourceHandle, path: &str) -> Option<ResourceHandle>;

    /// Produces an inert copy of `resource` that outlives its group.
    fn persist_clone(&self, resource: &ResourceHandle) -> ResourceHandle;
}
