//! Human-readable extension status.

use crate::registry::{ExtensionRegistry, LifecycleState};
use serde::Serialize;
use tracing::debug;

/// Receives the regenerated status text after every lifecycle transition.
pub trait StatusSink: Send + Sync {
    fn publish(&self, status: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn publish(&self, _status: &str) {}
}

/// Writes the status text to the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn publish(&self, status: &str) {
        debug!("Extension status:\n{}", status);
    }
}

/// Status of one extension at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionStatus {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub error: Option<String>,
}

impl ExtensionStatus {
    /// The line this extension contributes to the status text, if any.
    pub fn line(&self) -> Option<String> {
        match (&self.error, self.enabled) {
            (Some(error), _) => Some(format!("{}: FAILED TO LOAD! ({})", self.name, error)),
            (None, true) => Some(format!("{} : {}", self.name, self.version)),
            (None, false) => None,
        }
    }
}

/// Statuses of every extension, in priority order.
pub fn snapshot(registry: &ExtensionRegistry) -> Vec<ExtensionStatus> {
    registry
        .in_priority_order()
        .into_iter()
        .map(|instance| ExtensionStatus {
            name: instance.name().to_string(),
            version: instance.version().to_string(),
            enabled: instance.enabled(),
            error: instance.error_state().map(ToString::to_string),
        })
        .collect()
}

/// Header line followed by failed extensions, then enabled ones.
/// Disabled and not yet initialized extensions are left out.
pub fn render(header: &str, registry: &ExtensionRegistry) -> String {
    let statuses = snapshot(registry);
    let failed = statuses.iter().filter(|status| status.error.is_some());
    let enabled = statuses.iter().filter(|status| status.error.is_none());

    let mut lines = vec![header.to_string()];
    lines.extend(failed.chain(enabled).filter_map(ExtensionStatus::line));
    lines.join("\n")
}

/// Counts shown next to the header.
pub(crate) fn summary(registry: &ExtensionRegistry) -> String {
    let enabled = registry.iter().filter(|i| i.enabled()).count();
    let failed = registry
        .iter()
        .filter(|i| matches!(i.state(), LifecycleState::Failed(_)))
        .count();
    format!(
        "Extensions: {} loaded, {} failed, {} total",
        enabled,
        failed,
        registry.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str, enabled: bool, error: Option<&str>) -> ExtensionStatus {
        ExtensionStatus {
            name: name.to_string(),
            version: "1.0".to_string(),
            enabled,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(status("a", true, None).line().as_deref(), Some("a : 1.0"));
        assert_eq!(
            status("b", false, Some("initialize failed: boom")).line().as_deref(),
            Some("b: FAILED TO LOAD! (initialize failed: boom)")
        );
        assert_eq!(status("c", false, None).line(), None);
    }
}
