//! Configuration Management Module
//!
//! Benchmark settings loaded from TOML, JSON or YAML files, with environment
//! variable overrides and validation.

use crate::classifiers::{ClassifierTag, HyperparameterSearchConfig, Hyperparameters};
use crate::error::{BenchError, Result};
use crate::metrics::AucPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration file format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum ConfigFormat {
    Json,
    #[default]
    Toml,
    Yaml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(BenchError::Config(format!("Unsupported config format: {}", s))),
        }
    }
}

impl ConfigFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                BenchError::Config(format!("Config file {:?} has no extension", path))
            })?
            .parse()
    }
}

/// Benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Directory holding the `<fold_dir_prefix><fold>` directories
    pub data_root: PathBuf,
    pub results_dir: PathBuf,
    pub dataset_name: String,
    pub fold_dir_prefix: String,
    pub folds: Vec<usize>,
    pub shuffle_seed: u64,
    /// Runs of every probability-capable classifier per fold
    pub repeats: usize,
    pub parallel: bool,
    pub auc_policy: AucPolicy,
    pub probability_classifiers: Vec<ClassifierTag>,
    pub other_classifiers: Vec<ClassifierTag>,
    /// Number of leading `feature_order` columns used for fitting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_order: Option<Vec<usize>>,
    pub hyperparameters: BTreeMap<ClassifierTag, Hyperparameters>,
    pub hyperparameter_search: HyperparameterSearchConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            results_dir: PathBuf::from("./results"),
            dataset_name: "Synthetic".to_string(),
            fold_dir_prefix: "IT".to_string(),
            folds: (1..=10).collect(),
            shuffle_seed: 1,
            repeats: 1,
            parallel: false,
            auc_policy: AucPolicy::default(),
            probability_classifiers: vec![ClassifierTag::RF, ClassifierTag::GB, ClassifierTag::MLP],
            other_classifiers: vec![
                ClassifierTag::SVM,
                ClassifierTag::LR,
                ClassifierTag::MB,
                ClassifierTag::LR2,
            ],
            feature_count: None,
            feature_order: None,
            hyperparameters: BTreeMap::new(),
            hyperparameter_search: HyperparameterSearchConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    /// All configured classifiers, probability-capable loop first
    pub fn classifiers(&self) -> Vec<ClassifierTag> {
        self.probability_classifiers
            .iter()
            .chain(&self.other_classifiers)
            .copied()
            .collect()
    }

    /// Replace both classifier lists, keeping the given order within each loop
    pub fn set_classifiers(&mut self, tags: &[ClassifierTag]) {
        let (capable, other): (Vec<ClassifierTag>, Vec<ClassifierTag>) =
            tags.iter().copied().partition(|t| t.is_probability_capable());
        self.probability_classifiers = capable;
        self.other_classifiers = other;
    }

    /// Overrides configured for a tag, empty when there are none
    pub fn hyperparameters_for(&self, tag: ClassifierTag) -> Hyperparameters {
        self.hyperparameters.get(&tag).cloned().unwrap_or_default()
    }

    /// Column indices used for fitting, given the data width
    pub fn selected_features(&self, n_features: usize) -> Result<Vec<usize>> {
        let order: Vec<usize> = self
            .feature_order
            .clone()
            .unwrap_or_else(|| (0..n_features).collect());
        if let Some(&bad) = order.iter().find(|&&f| f >= n_features) {
            return Err(BenchError::Config(format!(
                "feature_order index {} out of bounds for {} features",
                bad, n_features
            )));
        }
        let count = self.feature_count.unwrap_or(order.len());
        if count == 0 || count > order.len() {
            return Err(BenchError::Config(format!(
                "feature_count {} must be between 1 and {}",
                count,
                order.len()
            )));
        }
        Ok(order[..count].to_vec())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: Option<PathBuf>,
    config_format: ConfigFormat,
    config: BenchmarkConfig,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Manager holding the default configuration, with no backing file
    pub fn new() -> Self {
        Self {
            config_path: None,
            config_format: ConfigFormat::default(),
            config: BenchmarkConfig::default(),
        }
    }

    /// Load configuration from an existing file; the format follows the extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config_format = ConfigFormat::from_path(&path)?;
        let mut manager = Self {
            config_path: Some(path),
            config_format,
            config: BenchmarkConfig::default(),
        };
        manager.load_config()?;
        Ok(manager)
    }

    /// Manager bound to a path; the file is created with defaults when missing
    pub fn with_path<P: AsRef<Path>>(path: P, format: ConfigFormat) -> Result<Self> {
        let mut manager = Self {
            config_path: Some(path.as_ref().to_path_buf()),
            config_format: format,
            config: BenchmarkConfig::default(),
        };

        if manager.config_exists() {
            manager.load_config()?;
        } else {
            manager.save_config()?;
        }

        Ok(manager)
    }

    /// Check if configuration file exists
    pub fn config_exists(&self) -> bool {
        self.config_path.as_ref().is_some_and(|p| p.exists())
    }

    fn config_file(&self) -> Result<&Path> {
        self.config_path
            .as_deref()
            .ok_or_else(|| BenchError::Config("No configuration file path set".to_string()))
    }

    /// Load configuration from file
    pub fn load_config(&mut self) -> Result<()> {
        let config_file = self.config_file()?.to_path_buf();

        if !config_file.exists() {
            return Err(BenchError::Config(format!(
                "Configuration file not found: {:?}",
                config_file
            )));
        }

        let content =
            fs::read_to_string(&config_file).map_err(|e| BenchError::io(&config_file, e))?;

        self.config = match self.config_format {
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse TOML config: {}", e)))?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse JSON config: {}", e)))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| BenchError::Config(format!("Failed to parse YAML config: {}", e)))?,
        };

        info!("Loaded configuration from {:?}", config_file);
        Ok(())
    }

    /// Save configuration to file
    pub fn save_config(&self) -> Result<()> {
        let config_file = self.config_file()?;

        if let Some(parent) = config_file.parent() {
            fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
        }

        let content = match self.config_format {
            ConfigFormat::Toml => toml::to_string_pretty(&self.config).map_err(|e| {
                BenchError::Serialization(format!("Failed to serialize TOML config: {}", e))
            })?,
            ConfigFormat::Json => serde_json::to_string_pretty(&self.config)?,
            ConfigFormat::Yaml => serde_yaml::to_string(&self.config).map_err(|e| {
                BenchError::Serialization(format!("Failed to serialize YAML config: {}", e))
            })?,
        };

        fs::write(config_file, content).map_err(|e| BenchError::io(config_file, e))?;

        info!("Saved configuration to {:?}", config_file);
        Ok(())
    }

    /// Apply `COMPBENCH_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(data_root) = lookup("COMPBENCH_DATA_ROOT") {
            debug!("Overriding data_root from environment: {}", data_root);
            self.config.data_root = PathBuf::from(data_root);
        }

        if let Some(results_dir) = lookup("COMPBENCH_RESULTS_DIR") {
            debug!("Overriding results_dir from environment: {}", results_dir);
            self.config.results_dir = PathBuf::from(results_dir);
        }

        if let Some(parallel) = lookup("COMPBENCH_PARALLEL") {
            self.config.parallel = match parallel.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(BenchError::Config(format!(
                        "Invalid COMPBENCH_PARALLEL value: {}",
                        other
                    )))
                }
            };
        }

        if let Some(seed) = lookup("COMPBENCH_SHUFFLE_SEED") {
            self.config.shuffle_seed = seed.parse().map_err(|_| {
                BenchError::Config(format!("Invalid COMPBENCH_SHUFFLE_SEED value: {}", seed))
            })?;
        }

        if let Some(policy) = lookup("COMPBENCH_AUC_POLICY") {
            self.config.auc_policy = policy.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate_config(&self) -> Result<()> {
        validate(&self.config)
    }

    pub fn get_config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut BenchmarkConfig {
        &mut self.config
    }

    pub fn into_config(self) -> BenchmarkConfig {
        self.config
    }

    pub fn get_config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn get_config_format(&self) -> ConfigFormat {
        self.config_format
    }
}

/// Check a configuration for values the runner cannot work with
pub fn validate(config: &BenchmarkConfig) -> Result<()> {
    if config.folds.is_empty() {
        return Err(BenchError::Config("Fold list cannot be empty".to_string()));
    }

    if config.repeats == 0 {
        return Err(BenchError::Config("repeats must be at least 1".to_string()));
    }

    if config.dataset_name.trim().is_empty() {
        return Err(BenchError::Config("dataset_name cannot be empty".to_string()));
    }

    let classifiers = config.classifiers();
    if classifiers.is_empty() {
        return Err(BenchError::Config("No classifiers configured".to_string()));
    }

    let mut seen = HashSet::new();
    for tag in &classifiers {
        if !seen.insert(*tag) {
            return Err(BenchError::Config(format!(
                "Classifier {} is configured more than once",
                tag
            )));
        }
    }

    if let Some(tag) = config
        .probability_classifiers
        .iter()
        .find(|tag| !tag.is_probability_capable())
    {
        return Err(BenchError::Config(format!(
            "{} cannot be listed in probability_classifiers",
            tag
        )));
    }
    if let Some(tag) = config
        .other_classifiers
        .iter()
        .find(|tag| tag.is_probability_capable())
    {
        return Err(BenchError::Config(format!(
            "{} belongs in probability_classifiers, not other_classifiers",
            tag
        )));
    }

    if let Some(order) = &config.feature_order {
        let mut seen = HashSet::new();
        if let Some(dup) = order.iter().find(|f| !seen.insert(**f)) {
            return Err(BenchError::Config(format!(
                "feature_order lists feature {} more than once",
                dup
            )));
        }
        if let Some(count) = config.feature_count {
            if count > order.len() {
                return Err(BenchError::Config(format!(
                    "feature_count {} exceeds feature_order length {}",
                    count,
                    order.len()
                )));
            }
        }
    }

    if config.feature_count == Some(0) {
        return Err(BenchError::Config("feature_count must be positive".to_string()));
    }

    if config.hyperparameter_search.scoring_metric != "accuracy" {
        return Err(BenchError::Config(format!(
            "Unsupported scoring_metric '{}'; only 'accuracy' is available",
            config.hyperparameter_search.scoring_metric
        )));
    }

    if config.hyperparameter_search.enabled && config.hyperparameter_search.cross_validation_folds < 2 {
        return Err(BenchError::Config(
            "Hyperparameter search needs at least 2 cross-validation folds".to_string(),
        ));
    }

    Ok(())
}
