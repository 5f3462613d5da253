//! Classifier Training
//!
//! Maps a classifier tag plus its hyperparameter overrides to a fitted model.

pub mod supervised;

pub use supervised::*;

use crate::classifiers::metadata::{ClassifierTag, HyperparameterSearchConfig, Hyperparameters};
use crate::classifiers::models::TrainedModel;
use crate::error::Result;
use ndarray::{Array1, ArrayView2};

/// Everything a training function needs besides its hyperparameters
#[derive(Clone, Copy)]
pub struct TrainingInput<'a> {
    pub features: ArrayView2<'a, f64>,
    pub targets: &'a Array1<usize>,
    pub n_classes: usize,
    /// Seed for every random choice the classifier makes
    pub seed: u64,
    /// Score hyperparameter candidates on the rayon pool
    pub parallel: bool,
}

/// Fit one classifier; returns the model and the hyperparameters it ran with
pub fn fit_classifier(
    tag: ClassifierTag,
    input: TrainingInput<'_>,
    hyperparameters: &Hyperparameters,
    search: &HyperparameterSearchConfig,
) -> Result<(Box<dyn TrainedModel>, Hyperparameters)> {
    crate::classifiers::models::validate_training_data(
        tag,
        input.features,
        input.targets,
        input.n_classes,
    )?;
    match tag {
        ClassifierTag::RF => train_random_forest(input, hyperparameters),
        ClassifierTag::SVM => train_svm(input, hyperparameters, search),
        ClassifierTag::GB => train_gradient_boosting(input, hyperparameters),
        ClassifierTag::LR => train_logistic_regression(tag, input, hyperparameters),
        ClassifierTag::LR2 => train_logistic_regression(tag, input, hyperparameters),
        ClassifierTag::MLP => train_mlp(input, hyperparameters),
        ClassifierTag::MB => train_naive_bayes(input, hyperparameters),
        ClassifierTag::ENET => train_elastic_net(input, hyperparameters),
    }
}
