//! Classifier Metadata Types
//!
//! This module contains the classifier tags, hyperparameter search settings
//! and the per-fit report that the runner collects into its manifest.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Hyperparameter overrides, keyed by hyperparameter name
pub type Hyperparameters = HashMap<String, serde_json::Value>;

/// Classifiers supported by the benchmark
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub enum ClassifierTag {
    /// Random forest
    RF,
    /// RBF support-vector classifier with grid search
    SVM,
    /// Gradient boosting
    GB,
    /// Logistic regression, L1 penalty
    LR,
    /// Logistic regression, L2 penalty
    LR2,
    /// Multilayer perceptron
    MLP,
    /// Multinomial naive Bayes
    MB,
    /// Elastic-net regression
    ENET,
}

impl ClassifierTag {
    pub const ALL: [ClassifierTag; 8] = [
        ClassifierTag::RF,
        ClassifierTag::SVM,
        ClassifierTag::GB,
        ClassifierTag::LR,
        ClassifierTag::LR2,
        ClassifierTag::MLP,
        ClassifierTag::MB,
        ClassifierTag::ENET,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierTag::RF => "RF",
            ClassifierTag::SVM => "SVM",
            ClassifierTag::GB => "GB",
            ClassifierTag::LR => "LR",
            ClassifierTag::LR2 => "LR2",
            ClassifierTag::MLP => "MLP",
            ClassifierTag::MB => "MB",
            ClassifierTag::ENET => "ENET",
        }
    }

    /// Whether the classifier belongs to the probability-capable set.
    ///
    /// This is the nominal partition used to split the benchmark loops; the
    /// fitted model reports its actual capability through `supports_proba`.
    pub fn is_probability_capable(&self) -> bool {
        matches!(
            self,
            ClassifierTag::RF | ClassifierTag::GB | ClassifierTag::MLP
        )
    }

    /// Human readable model name used in log lines
    pub fn model_name(&self) -> &'static str {
        match self {
            ClassifierTag::RF => "Random Forest",
            ClassifierTag::SVM => "SVM",
            ClassifierTag::GB => "Gradient Boosting",
            ClassifierTag::LR => "Logistic Regression (L1)",
            ClassifierTag::LR2 => "Logistic Regression (L2)",
            ClassifierTag::MLP => "MLP",
            ClassifierTag::MB => "Multinomial Naive Bayes",
            ClassifierTag::ENET => "Elastic Net",
        }
    }
}

impl fmt::Display for ClassifierTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierTag {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        ClassifierTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| BenchError::UnsupportedClassifier(trimmed.to_string()))
    }
}

impl TryFrom<String> for ClassifierTag {
    type Error = BenchError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ClassifierTag> for String {
    fn from(tag: ClassifierTag) -> Self {
        tag.as_str().to_string()
    }
}

/// Hyperparameter search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSearchConfig {
    pub enabled: bool,
    pub search_type: HyperparameterSearchType,
    pub cross_validation_folds: usize,
    pub scoring_metric: String,
}

impl Default for HyperparameterSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_type: HyperparameterSearchType::GridSearch,
            cross_validation_folds: 3,
            scoring_metric: "accuracy".to_string(),
        }
    }
}

/// Types of hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HyperparameterSearchType {
    GridSearch,
}

/// Report produced for every fitted classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub tag: ClassifierTag,
    pub fold: usize,
    pub repeat: usize,
    pub training_time_ms: u64,
    pub training_data_size: usize,
    pub n_features: usize,
    pub hyperparameters: Hyperparameters,
    /// `(column, importance)` pairs, most important first, zeros dropped
    pub feature_ranking: Vec<(usize, f64)>,
}
