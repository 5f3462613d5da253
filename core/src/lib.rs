//! CompBench Core Module
//!
//! Benchmarks classification algorithms on pre-split synthetic compositional
//! datasets. For every fold the configured classifiers are fitted on the
//! row-normalized training data and scored on the test data; the metric
//! values are collected into a [`ResultsMap`] and written to disk.

pub mod benchmark;
pub mod classifiers;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod results;

pub use benchmark::{BenchmarkRunner, RunManifest, RunOutcome};
pub use classifiers::{ClassifierTag, FitReport, FittedModel, Hyperparameters, TrainedModel};
pub use config::{BenchmarkConfig, ConfigFormat, ConfigManager};
pub use data::{DataLoader, DatasetParams, FoldData};
pub use error::{BenchError, Result};
pub use metrics::{AucPolicy, MetricsEvaluator};
pub use results::{Metric, MetricSummary, ResultsMap};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
