//! Configuration types for the principal mapper.

use crate::rule::MappedJsonPath;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the principal mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Configuration version
    pub version: String,
    /// Global settings
    pub settings: Settings,
    /// Mapping rules (evaluated in priority order)
    pub mappings: Vec<MappingConfig>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: Settings::default(),
            mappings: vec![],
        }
    }
}

impl MapperConfig {
    /// Parse configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a file. `.yaml` and `.yml` files are read as
    /// YAML, everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Principal used when no mapping yields a value
    pub default_principal: Option<String>,
    /// Reject a mapping that yields more than one value
    pub require_unique: bool,
}

/// A named mapping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Mapping name (for logging/debugging)
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
    /// Whether the mapping is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Priority (higher = evaluated first)
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Rule in `<jsonpath>[/<regex>/<replacement>[/<L|U>]]` form
    pub rule: MappedJsonPath,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    50
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
