//! Benchmark errors

use std::io;
use std::path::PathBuf;

/// Errors raised while loading data, fitting classifiers or evaluating metrics.
///
/// Every variant is fatal to a benchmark run: the runner aborts before the
/// results artifact is written.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {path:?} at line {line}, column {column}: {token:?} is not a number")]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        token: String,
    },

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Invalid label {value} at position {index}: {reason}")]
    InvalidLabel {
        index: usize,
        value: f64,
        reason: String,
    },

    #[error("Unsupported classifier: '{0}'")]
    UnsupportedClassifier(String),

    #[error("Classifier {tag} does not expose class probabilities")]
    ProbabilitiesUnavailable { tag: String },

    #[error("Training {tag} failed: {reason}")]
    Fit { tag: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BenchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn fit(tag: impl ToString, reason: impl ToString) -> Self {
        BenchError::Fit {
            tag: tag.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error comes from configuration rather than the run itself.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BenchError::Config(_) | BenchError::UnsupportedClassifier(_)
        )
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}

/// Result type for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;
