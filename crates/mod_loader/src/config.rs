use serde::{Deserialize, Serialize};

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum number of resource groups open at once during preloading
    #[serde(default = "default_batch_size")]
    pub preload_batch_size: usize,
    /// Toggle-capable extensions switched off right after startup
    #[serde(default)]
    pub disabled_extensions: Vec<String>,
}

fn default_batch_size() -> usize {
    5
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            preload_batch_size: default_batch_size(),
            disabled_extensions: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.preload_batch_size == 0 {
            return Err("preload_batch_size must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_extensions.iter().any(|disabled| disabled == name)
    }
}
