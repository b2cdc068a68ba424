//! Lab configuration: latency profiles, simulated models and settings.
//!
//! Configuration files are YAML. A file only needs to list what it adds
//! or overrides; everything else falls back to the built-in profiles and
//! models. Several files can be layered with [`LabConfig::load_glob`].

use crate::compare::PValueMethod;
use crate::degradation::MonitoringThresholds;
use crate::latency::{builtin_profiles, LatencyProfile, ProfileRegistry};
use crate::rng::Seed;
use crate::simulator::{builtin_models, ModelCatalog, ModelSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid latency profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid statistics settings: {0}")]
    InvalidSettings(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),
}

/// Statistics settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatSettings {
    /// p-value method for comparisons
    #[serde(default)]
    pub p_value_method: PValueMethod,
    /// Histogram bucket count for latency summaries
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: usize,
    /// Seed for reproducible runs; unseeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_histogram_buckets() -> usize {
    10
}

impl Default for StatSettings {
    fn default() -> Self {
        Self {
            p_value_method: PValueMethod::default(),
            histogram_buckets: default_histogram_buckets(),
            seed: None,
        }
    }
}

impl StatSettings {
    /// Configured seed, or a freshly drawn one when absent
    #[must_use]
    pub fn seed(&self) -> Seed {
        self.seed.map_or_else(Seed::from_entropy, Seed::new)
    }
}

/// One YAML file as written on disk
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    profiles: Vec<LatencyProfile>,
    #[serde(default)]
    models: Vec<ModelSpec>,
    #[serde(default)]
    stats: Option<StatSettings>,
    #[serde(default)]
    monitoring: Option<MonitoringThresholds>,
}

/// Complete lab configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabConfig {
    /// Latency profiles
    pub profiles: Vec<LatencyProfile>,
    /// Simulated models
    pub models: Vec<ModelSpec>,
    /// Statistics settings
    #[serde(default)]
    pub stats: StatSettings,
    /// Degradation alert thresholds
    #[serde(default)]
    pub monitoring: MonitoringThresholds,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            profiles: builtin_profiles(),
            models: builtin_models(),
            stats: StatSettings::default(),
            monitoring: MonitoringThresholds::default(),
        }
    }
}

impl LabConfig {
    /// Load configuration from a YAML file, layered over the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string, layered over the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or validated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.merge_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and layer every file matching a glob pattern (e.g. "config/*.yaml")
    ///
    /// Files are applied in path order; later files override profiles and
    /// models of the same name and replace settings they specify.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or any file fails to load.
    pub fn load_glob(pattern: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let paths = glob::glob(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

        for entry in paths {
            let path = entry.map_err(|e| {
                ConfigError::IoError(std::io::Error::other(format!("Glob error: {e}")))
            })?;
            let content = std::fs::read_to_string(&path)?;
            config.merge_yaml(&content)?;
            tracing::debug!(path = %path.display(), "merged config file");
        }

        config.validate()?;
        Ok(config)
    }

    fn merge_yaml(&mut self, yaml: &str) -> Result<(), ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        ensure_unique("profile", file.profiles.iter().map(|p| p.name.as_str()))?;
        ensure_unique("model", file.models.iter().map(|m| m.name.as_str()))?;

        for profile in file.profiles {
            upsert(&mut self.profiles, profile, |p| p.name.clone());
        }
        for model in file.models {
            upsert(&mut self.models, model, |m| m.name.clone());
        }
        if let Some(stats) = file.stats {
            self.stats = stats;
        }
        if let Some(monitoring) = file.monitoring {
            self.monitoring = monitoring;
        }
        Ok(())
    }

    /// Check every profile, model and setting
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_unique("profile", self.profiles.iter().map(|p| p.name.as_str()))?;
        ensure_unique("model", self.models.iter().map(|m| m.name.as_str()))?;

        for profile in &self.profiles {
            profile
                .validate()
                .map_err(|e| ConfigError::InvalidProfile(e.to_string()))?;
        }

        let known: BTreeSet<&str> = self.profiles.iter().map(|p| p.name.as_str()).collect();
        for model in &self.models {
            model
                .validate()
                .map_err(|e| ConfigError::InvalidModel(e.to_string()))?;
            if !known.contains(model.latency_profile.as_str()) {
                return Err(ConfigError::InvalidModel(format!(
                    "model '{}' references unknown profile '{}'",
                    model.name, model.latency_profile
                )));
            }
        }

        if self.stats.histogram_buckets == 0 {
            return Err(ConfigError::InvalidSettings(
                "histogram_buckets must be positive".to_string(),
            ));
        }
        let m = &self.monitoring;
        if !(m.warning_z.is_finite() && m.warning_z >= 0.0 && m.critical_z >= m.warning_z) {
            return Err(ConfigError::InvalidSettings(format!(
                "thresholds must satisfy 0 <= warning_z ({}) <= critical_z ({})",
                m.warning_z, m.critical_z
            )));
        }
        Ok(())
    }

    /// Build the immutable profile registry
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidProfile` for invalid or duplicate profiles.
    pub fn profile_registry(&self) -> Result<ProfileRegistry, ConfigError> {
        ProfileRegistry::new(self.profiles.iter().cloned())
            .map_err(|e| ConfigError::InvalidProfile(e.to_string()))
    }

    /// Build the immutable model catalog against a registry
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidModel` for invalid models or unknown profiles.
    pub fn model_catalog(&self, profiles: &ProfileRegistry) -> Result<ModelCatalog, ConfigError> {
        ModelCatalog::new(self.models.iter().cloned(), profiles)
            .map_err(|e| ConfigError::InvalidModel(e.to_string()))
    }
}

fn ensure_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName(format!("{kind} '{name}'")));
        }
    }
    Ok(())
}

fn upsert<T>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> String) {
    let name = key(&item);
    match items.iter_mut().find(|existing| key(existing) == name) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}
