//! Groups declared resource requests by resource group.

use crate::extension::GroupHook;
use crate::registry::ExtensionInstance;
use crate::request::ResourceRequest;
use tracing::{debug, warn};

/// Requests and group hooks against one resource group, per extension.
#[derive(Debug, Clone)]
pub struct GroupPlan {
    name: String,
    entries: Vec<(String, Vec<ResourceRequest>)>,
    hooks: Vec<(String, GroupHook)>,
}

impl GroupPlan {
    fn new(name: String) -> Self {
        Self {
            name,
            entries: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(extension name, requests)` in priority order.
    pub fn entries(&self) -> &[(String, Vec<ResourceRequest>)] {
        &self.entries
    }

    /// `(extension name, hook)` in priority order.
    pub fn hooks(&self) -> &[(String, GroupHook)] {
        &self.hooks
    }

    /// Number of requested paths in this group. Hooks do not count.
    pub fn work_size(&self) -> usize {
        self.entries.iter().map(|(_, requests)| requests.len()).sum()
    }

    /// Adds a request, returning false if the extension already asked for
    /// the same path in this group.
    fn add(&mut self, extension: &str, request: ResourceRequest) -> bool {
        let index = match self.entries.iter().position(|(name, _)| name == extension) {
            Some(index) => index,
            None => {
                self.entries.push((extension.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        let requests = &mut self.entries[index].1;
        if requests.contains(&request) {
            return false;
        }
        requests.push(request);
        true
    }
}

/// Ordered group plans; groups appear in the order they were first requested.
#[derive(Debug, Clone, Default)]
pub struct PreloadPlan {
    groups: Vec<GroupPlan>,
}

impl PreloadPlan {
    pub fn groups(&self) -> &[GroupPlan] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&GroupPlan> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_requests(&self) -> usize {
        self.groups.iter().map(GroupPlan::work_size).sum()
    }

    /// Attaches a group hook, adding its group to the plan if nothing
    /// requested resources from it.
    pub fn add_group_hook(&mut self, extension: &str, hook: GroupHook) {
        if hook.group().is_empty() {
            warn!("⚠️ Dropping group hook without a group from extension {}", extension);
            return;
        }
        let slot = self.slot(hook.group());
        self.groups[slot].hooks.push((extension.to_string(), hook));
    }

    fn slot(&mut self, group: &str) -> usize {
        match self.groups.iter().position(|plan| plan.name == group) {
            Some(index) => index,
            None => {
                self.groups.push(GroupPlan::new(group.to_string()));
                self.groups.len() - 1
            }
        }
    }
}

/// Plans the requests and group hooks of `instances`, which must already be
/// in load-priority order.
pub fn plan<'a, I>(instances: I) -> PreloadPlan
where
    I: IntoIterator<Item = &'a ExtensionInstance>,
{
    let instances: Vec<&ExtensionInstance> = instances.into_iter().collect();
    let mut plan = plan_requests(
        instances
            .iter()
            .map(|instance| (instance.name(), instance.declared_requests())),
    );
    for instance in &instances {
        for hook in instance.group_hooks() {
            plan.add_group_hook(instance.name(), hook.clone());
        }
    }
    plan
}

/// Plans raw `(extension, [(group, path)])` declarations.
///
/// Invalid requests are dropped with a warning, as are repeated requests of
/// the same path by the same extension in the same group.
pub fn plan_requests<'a, I>(declarations: I) -> PreloadPlan
where
    I: IntoIterator<Item = (&'a str, &'a [(String, String)])>,
{
    let mut plan = PreloadPlan::default();

    for (extension, declared) in declarations {
        for (group, path) in declared {
            let request = match ResourceRequest::new(group.as_str(), path.as_str()) {
                Ok(request) => request,
                Err(e) => {
                    warn!(
                        "⚠️ Dropping resource request {}/{} from extension {}: {}",
                        group, path, extension, e
                    );
                    continue;
                }
            };

            let slot = plan.slot(group);
            if !plan.groups[slot].add(extension, request) {
                warn!(
                    "⚠️ Extension {} requested {}/{} more than once",
                    extension, group, path
                );
            }
        }
    }

    debug!(
        "Planned {} resource requests across {} groups",
        plan.total_requests(),
        plan.groups.len()
    );
    plan
}
