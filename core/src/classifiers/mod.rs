//! Classifiers
//!
//! Tags, hyperparameter handling, model implementations and the training
//! entry point used by the benchmark runner.

pub mod metadata;
pub mod models;
pub mod operations;
pub mod search;
pub mod trainer;


pub use metadata::*;
pub use models::{FittedModel, TrainedModel};
pub use operations::NDArrayOperations;
pub use trainer::{fit_classifier, TrainingInput};
