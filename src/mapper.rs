//! Principal resolution from claim sets.

use crate::config::{MapperConfig, MappingConfig, Settings};
use crate::rule::MappedJsonPath;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// Resolves a principal from a decoded claim set using configured rules.
///
/// Mappings are tried in priority order; the first one producing at least
/// one value wins.
pub struct PrincipalMapper {
    /// Enabled mappings, highest priority first
    mappings: Vec<CompiledMapping>,
    /// Global settings
    settings: Settings,
    /// Metrics: total resolutions attempted.
    evaluations: AtomicU64,
    /// Metrics: resolutions answered by a mapping.
    resolved: AtomicU64,
    /// Metrics: resolutions answered by the default principal.
    fallbacks: AtomicU64,
    /// Metrics: resolutions that failed.
    failures: AtomicU64,
}

struct CompiledMapping {
    name: String,
    rule: MappedJsonPath,
}

/// The mapping that resolved a claim set and the values it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Name of the winning mapping
    pub mapping: String,
    /// Values in match order, never empty
    pub values: Vec<String>,
}

/// A resolved principal and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    /// Winning mapping, `None` when the default principal was used
    pub mapping: Option<String>,
}

/// Point-in-time copy of the mapper counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperStats {
    pub evaluations: u64,
    pub resolved: u64,
    pub fallbacks: u64,
    pub failures: u64,
}

impl PrincipalMapper {
    /// Create a new mapper from configuration.
    pub fn new(config: MapperConfig) -> Result<Self, MapperError> {
        let mut seen = HashSet::new();
        for mapping in &config.mappings {
            if !seen.insert(mapping.name.as_str()) {
                return Err(MapperError::DuplicateMapping(mapping.name.clone()));
            }
        }

        let mut enabled: Vec<MappingConfig> =
            config.mappings.into_iter().filter(|m| m.enabled).collect();
        // Stable sort keeps declaration order for equal priorities.
        enabled.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mappings: Vec<CompiledMapping> = enabled
            .into_iter()
            .map(|m| CompiledMapping {
                name: m.name,
                rule: m.rule,
            })
            .collect();

        info!(
            mappings = mappings.len(),
            default_principal = config.settings.default_principal.is_some(),
            require_unique = config.settings.require_unique,
            "Principal mapper initialized"
        );

        Ok(Self {
            mappings,
            settings: config.settings,
            evaluations: AtomicU64::new(0),
            resolved: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, MapperError> {
        let config = MapperConfig::from_yaml(yaml)?;
        Self::new(config)
    }

    /// Create from a JSON configuration string.
    pub fn from_json(json: &str) -> Result<Self, MapperError> {
        let config = MapperConfig::from_json(json)?;
        Self::new(config)
    }

    /// Names of the enabled mappings in evaluation order.
    pub fn mapping_names(&self) -> impl Iterator<Item = &str> {
        self.mappings.iter().map(|m| m.name.as_str())
    }

    /// Find the first mapping that yields a value for `claims`.
    pub fn resolve(&self, claims: &JsonValue) -> Option<Resolution> {
        for mapping in &self.mappings {
            let values = mapping.rule.eval(claims);
            trace!(
                mapping = %mapping.name,
                rule = %mapping.rule,
                values = values.len(),
                "Evaluated mapping"
            );
            if !values.is_empty() {
                debug!(mapping = %mapping.name, values = ?values, "Mapping resolved");
                return Some(Resolution {
                    mapping: mapping.name.clone(),
                    values,
                });
            }
        }
        None
    }

    /// Resolve a single principal for `claims`.
    ///
    /// Falls back to the configured default principal when no mapping
    /// yields a value.
    pub fn principal(&self, claims: &JsonValue) -> Result<String, MapperError> {
        self.identify(claims).map(|p| p.name)
    }

    /// Like [`principal`](Self::principal), also reporting the mapping that
    /// produced it.
    pub fn identify(&self, claims: &JsonValue) -> Result<Principal, MapperError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let Some(resolution) = self.resolve(claims) else {
            if let Some(default) = &self.settings.default_principal {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                debug!(principal = %default, "No mapping resolved, using default principal");
                return Ok(Principal {
                    name: default.clone(),
                    mapping: None,
                });
            }
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!("No mapping resolved a principal");
            return Err(MapperError::NoPrincipal);
        };

        if self.settings.require_unique && resolution.values.len() > 1 {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                mapping = %resolution.mapping,
                count = resolution.values.len(),
                "Mapping produced more than one principal"
            );
            return Err(MapperError::Ambiguous {
                mapping: resolution.mapping,
                count: resolution.values.len(),
            });
        }

        self.resolved.fetch_add(1, Ordering::Relaxed);
        let mut values = resolution.values;
        Ok(Principal {
            name: values.swap_remove(0),
            mapping: Some(resolution.mapping),
        })
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> MapperStats {
        MapperStats {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Mapper errors.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("duplicate mapping name {0:?}")]
    DuplicateMapping(String),

    #[error("no mapping produced a principal")]
    NoPrincipal,

    #[error("mapping {mapping:?} produced {count} principals, expected one")]
    Ambiguous { mapping: String, count: usize },
}
