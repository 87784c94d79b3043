//! Discovered extensions and their lifecycle state.

use crate::error::ErrorState;
use crate::extension::{Extension, ExtensionFactory, GroupHook};
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

/// Where an extension is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Discovered,
    Constructed,
    Initialized,
    Disabled,
    Failed(ErrorState),
}

/// One discovered extension. Created by discovery, mutated only by the
/// lifecycle executor, never removed.
pub struct ExtensionInstance {
    name: String,
    priority: i32,
    discovery_index: usize,
    factory: Box<dyn ExtensionFactory>,
    extension: Option<Box<dyn Extension>>,
    version: String,
    requests: Vec<(String, String)>,
    group_hooks: Vec<GroupHook>,
    toggleable: bool,
    state: LifecycleState,
}

impl ExtensionInstance {
    fn new(factory: Box<dyn ExtensionFactory>, discovery_index: usize) -> Self {
        Self {
            name: factory.name().to_string(),
            priority: factory.priority(),
            discovery_index,
            factory,
            extension: None,
            version: "UNKNOWN".to_string(),
            requests: Vec::new(),
            group_hooks: Vec::new(),
            toggleable: false,
            state: LifecycleState::Discovered,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn discovery_index(&self) -> usize {
        self.discovery_index
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// True only while initialized.
    pub fn enabled(&self) -> bool {
        self.state == LifecycleState::Initialized
    }

    pub fn error_state(&self) -> Option<&ErrorState> {
        match &self.state {
            LifecycleState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_toggleable(&self) -> bool {
        self.toggleable
    }

    /// Resource requests collected right after construction.
    pub fn declared_requests(&self) -> &[(String, String)] {
        &self.requests
    }

    /// Group hooks collected right after construction.
    pub fn group_hooks(&self) -> &[GroupHook] {
        &self.group_hooks
    }

    pub(crate) fn factory(&self) -> &dyn ExtensionFactory {
        self.factory.as_ref()
    }

    pub(crate) fn extension_mut(&mut self) -> Option<&mut (dyn Extension + 'static)> {
        self.extension.as_deref_mut()
    }

    pub(crate) fn mark_constructed(
        &mut self,
        extension: Box<dyn Extension>,
        version: String,
        requests: Vec<(String, String)>,
        group_hooks: Vec<GroupHook>,
        toggleable: bool,
    ) {
        self.extension = Some(extension);
        self.version = version;
        self.requests = requests;
        self.group_hooks = group_hooks;
        self.toggleable = toggleable;
        self.state = LifecycleState::Constructed;
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub(crate) fn fail(&mut self, error: ErrorState) {
        self.state = LifecycleState::Failed(error);
    }
}

impl fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("version", &self.version)
            .field("state", &self.state)
            .finish()
    }
}

/// Every discovered extension, in discovery order.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    instances: Vec<ExtensionInstance>,
}

impl ExtensionRegistry {
    /// Records one instance per factory. A factory whose name was already
    /// seen is skipped with a warning.
    pub fn discover<I>(factories: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn ExtensionFactory>>,
    {
        let mut seen = HashSet::new();
        let mut instances = Vec::new();

        for factory in factories {
            let name = factory.name().to_string();
            if !seen.insert(name.clone()) {
                warn!("⚠️ Duplicate extension name {}, skipping", name);
                continue;
            }
            instances.push(ExtensionInstance::new(factory, instances.len()));
        }

        info!("🔍 Discovered {} extensions", instances.len());
        Self { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionInstance> {
        self.instances.iter().find(|instance| instance.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut ExtensionInstance> {
        self.instances.iter_mut().find(|instance| instance.name == name)
    }

    /// Instances in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionInstance> {
        self.instances.iter()
    }

    /// Instances in load-priority order: ascending priority, ties by
    /// discovery order.
    pub fn in_priority_order(&self) -> Vec<&ExtensionInstance> {
        let mut ordered: Vec<&ExtensionInstance> = self.instances.iter().collect();
        ordered.sort_by_key(|instance| (instance.priority, instance.discovery_index));
        ordered
    }

    pub fn names_in_priority_order(&self) -> Vec<String> {
        self.in_priority_order()
            .into_iter()
            .map(|instance| instance.name.clone())
            .collect()
    }
}
