//! Configuration management for the demo host.
//!
//! Loads the TOML configuration, writing a default file when none exists,
//! and validates it before the runtime starts.

use anyhow::Context;
use mod_loader::{MemoryHost, RuntimeConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extension runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// In-memory world served to the extensions
    #[serde(default)]
    pub world: WorldSettings,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

/// Resource groups and player fields of the demo world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Initial values of the hooked player fields
    #[serde(default)]
    pub fields: BTreeMap<String, toml::Value>,
    /// Resource groups the host can open
    #[serde(default)]
    pub groups: Vec<GroupSettings>,
}

/// One resource group: a name and the slash-separated resource paths in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    pub name: String,
    pub resources: Vec<String>,
}

impl GroupSettings {
    fn new(name: &str, resources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl Default for WorldSettings {
    fn default() -> Self {
        let fields = BTreeMap::from([
            ("health".to_string(), toml::Value::Integer(5)),
            ("max_health".to_string(), toml::Value::Integer(5)),
            ("geo".to_string(), toml::Value::Integer(0)),
            ("can_dash".to_string(), toml::Value::Boolean(false)),
        ]);
        Self {
            fields,
            groups: vec![
                GroupSettings::new("Tutorial_01", &["Crawler", "Crawler/Shell", "Gate"]),
                GroupSettings::new("Town", &["Elderbug", "Bench"]),
                GroupSettings::new("Crossroads", &["Husk", "Husk/Shield", "Mosscreep"]),
            ],
        }
    }
}

impl WorldSettings {
    /// Builds the in-memory host serving these groups.
    pub fn to_host(&self) -> MemoryHost {
        self.groups.iter().fold(MemoryHost::new(), |host, group| {
            host.with_paths(group.name.clone(), group.resources.iter())
        })
    }

    /// Player fields as JSON values.
    pub fn json_fields(&self) -> anyhow::Result<Vec<(String, serde_json::Value)>> {
        self.fields
            .iter()
            .map(|(name, value)| {
                let json = serde_json::to_value(value)
                    .with_context(|| format!("field {} is not representable as JSON", name))?;
                Ok((name.clone(), json))
            })
            .collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            logging: LoggingSettings::default(),
            world: WorldSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration file is written at
    /// the given path and the default configuration is returned.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        self.runtime.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        let mut seen = HashSet::new();
        for group in &self.world.groups {
            if group.name.is_empty() {
                return Err("Resource group names cannot be empty".to_string());
            }
            if !seen.insert(group.name.as_str()) {
                return Err(format!("Duplicate resource group: {}", group.name));
            }
        }

        Ok(())
    }
}
