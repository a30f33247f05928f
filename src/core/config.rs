//! Pipeline configuration model
//!
//! A pipeline configuration is an open mapping of job names to job
//! definitions, plus a handful of well-known directive keys (`stages`,
//! `workflow`, `variables`, ...). Unknown keys must survive compilation
//! byte-for-byte, so the model is a thin wrapper over an ordered
//! `serde_yaml::Mapping` rather than a fixed record.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use thiserror::Error;

/// Top-level keys that are directives rather than job definitions
pub const NON_JOB_KEYS: [&str; 11] = [
    "stages",
    "workflow",
    "variables",
    "default",
    "include",
    "image",
    "services",
    "cache",
    "before_script",
    "after_script",
    "types",
];

/// Error types for configuration handling
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base configuration is not a mapping of job names to
    /// definitions. This is the only fatal compilation error.
    #[error("base configuration is not a mapping of job names to definitions")]
    MalformedBaseConfig,

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A CI pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineConfig(Mapping);

impl PipelineConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self(Mapping::new())
    }

    /// Wrap an already-parsed mapping
    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(mapping)
    }

    /// Load a configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }

    /// Parse a configuration from a YAML string
    ///
    /// An empty or null document is a valid empty pipeline; anything
    /// that is not a mapping is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        match value {
            Value::Mapping(mapping) => Ok(Self(mapping)),
            Value::Null => Ok(Self::new()),
            _ => Err(ConfigError::MalformedBaseConfig),
        }
    }

    /// Serialize the configuration back to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Check that every job-like entry is a mapping and that `stages`,
    /// if present, is a sequence of strings
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in &self.0 {
            let Some(name) = key.as_str() else {
                return Err(ConfigError::MalformedBaseConfig);
            };
            if name == "stages" {
                match value {
                    Value::Sequence(seq) if seq.iter().all(|s| s.as_str().is_some()) => {}
                    _ => return Err(ConfigError::MalformedBaseConfig),
                }
            } else if !NON_JOB_KEYS.contains(&name) && !value.is_mapping() {
                return Err(ConfigError::MalformedBaseConfig);
            }
        }
        Ok(())
    }

    /// The declared stage list, if any
    pub fn stages(&self) -> Option<Vec<String>> {
        self.0.get("stages")?.as_sequence().map(|seq| {
            seq.iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect()
        })
    }

    /// Whether the configuration declares a `stages` key at all
    pub fn has_stages_key(&self) -> bool {
        self.0.contains_key("stages")
    }

    /// Replace the stage list
    pub fn set_stages(&mut self, stages: Vec<String>) {
        let seq = stages.into_iter().map(Value::String).collect();
        self.0
            .insert(Value::String("stages".into()), Value::Sequence(seq));
    }

    /// Get a job definition by name
    pub fn job(&self, name: &str) -> Option<&Mapping> {
        if NON_JOB_KEYS.contains(&name) {
            return None;
        }
        self.0.get(name)?.as_mapping()
    }

    /// The declared `stage` of a job, if any
    pub fn job_stage(&self, name: &str) -> Option<&str> {
        self.job(name)?.get("stage")?.as_str()
    }

    /// Iterate over job entries, in document order
    pub fn jobs(&self) -> impl Iterator<Item = (&str, &Mapping)> {
        self.0.iter().filter_map(|(key, value)| {
            let name = key.as_str()?;
            if NON_JOB_KEYS.contains(&name) {
                return None;
            }
            Some((name, value.as_mapping()?))
        })
    }

    /// Insert or replace a job definition
    pub fn insert_job(&mut self, name: &str, definition: Mapping) {
        self.0
            .insert(Value::String(name.into()), Value::Mapping(definition));
    }

    /// Remove a top-level entry by name
    pub fn remove(&mut self, name: &str) {
        self.0.remove(name);
    }

    /// Whether a top-level key exists
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Insert an arbitrary directive value
    pub fn insert_value(&mut self, key: &str, value: Value) {
        self.0.insert(Value::String(key.into()), value);
    }

    /// Access the underlying mapping
    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}
