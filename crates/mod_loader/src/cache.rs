use crate::host::ResourceHandle;
use std::collections::HashMap;

/// Preloaded resources of one extension, keyed by group then path.
#[derive(Debug, Clone, Default)]
pub struct ExtensionResources {
    groups: HashMap<String, HashMap<String, ResourceHandle>>,
}

impl ExtensionResources {
    pub fn get(&self, group: &str, path: &str) -> Option<&ResourceHandle> {
        self.groups.get(group)?.get(path)
    }

    pub fn group(&self, group: &str) -> Option<&HashMap<String, ResourceHandle>> {
        self.groups.get(group)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, group: String, path: String, handle: ResourceHandle) {
        self.groups.entry(group).or_default().insert(path, handle);
    }
}

/// Every preloaded resource, keyed by extension name.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    entries: HashMap<String, ExtensionResources>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources of one extension. Empty if it requested nothing or nothing
    /// could be found.
    pub fn slice(&self, extension: &str) -> ExtensionResources {
        self.entries.get(extension).cloned().unwrap_or_default()
    }

    pub fn get(&self, extension: &str, group: &str, path: &str) -> Option<&ResourceHandle> {
        self.entries.get(extension)?.get(group, path)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Total number of cached resources.
    pub fn len(&self) -> usize {
        self.entries.values().map(ExtensionResources::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(
        &mut self,
        extension: String,
        group: String,
        path: String,
        handle: ResourceHandle,
    ) {
        self.entries
            .entry(extension)
            .or_default()
            .insert(group, path, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices_are_per_extension() {
        let mut cache = ResourceCache::new();
        cache.insert(
            "a".into(),
            "Town".into(),
            "Elderbug".into(),
            ResourceHandle::new("Elderbug", 1u32),
        );
        cache.insert(
            "b".into(),
            "Town".into(),
            "Elderbug".into(),
            ResourceHandle::new("Elderbug", 2u32),
        );

        let slice = cache.slice("a");
        assert_eq!(slice.len(), 1);
        assert_eq!(
            slice.get("Town", "Elderbug").and_then(|h| h.downcast_ref::<u32>()),
            Some(&1)
        );
        assert!(cache.slice("nobody").is_empty());
        assert_eq!(cache.len(), 2);
    }
}
