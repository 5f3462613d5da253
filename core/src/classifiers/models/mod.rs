//! Trained model implementations
//!
//! Every model predicts canonical class ids `0..n_classes` and, when it can,
//! emits one probability column per class id. Classes missing from the
//! training fold get a zero probability column.

use crate::classifiers::metadata::ClassifierTag;
use crate::classifiers::operations::NDArrayOperations;
use crate::error::{BenchError, Result};
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use smartcore::linalg::basic::matrix::DenseMatrix;

pub mod boosting;
pub mod elastic_net;
pub mod forest;
pub mod logistic;
pub mod mlp;
pub mod naive_bayes;
pub mod svm;
pub mod tree;

pub use boosting::{GradientBoosting, GradientBoostingParams};
pub use elastic_net::{ElasticNetParams, ElasticNetRegressor};
pub use forest::{RandomForest, RandomForestParams};
pub use logistic::{LogisticParams, LogisticRegression, Penalty};
pub use mlp::{MlpClassifier, MlpParams};
pub use naive_bayes::{MultinomialNaiveBayes, NaiveBayesParams};
pub use svm::{SupportVectorClassifier, SvmParams};

/// A fitted model operating on the feature columns it was trained on
pub trait TrainedModel: Send + Sync {
    fn tag(&self) -> ClassifierTag;

    /// Number of canonical classes the model predicts over
    fn n_classes(&self) -> usize;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>>;

    fn supports_proba(&self) -> bool {
        false
    }

    /// Class probabilities, one column per class id
    fn predict_proba(&self, _x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Err(BenchError::ProbabilitiesUnavailable {
            tag: self.tag().to_string(),
        })
    }

    /// Per-feature importance, when the model defines one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Trained model together with the feature subset it was fitted on
pub struct FittedModel {
    features: Vec<usize>,
    n_features_in: usize,
    model: Box<dyn TrainedModel>,
}

impl FittedModel {
    pub fn new(features: Vec<usize>, n_features_in: usize, model: Box<dyn TrainedModel>) -> Self {
        Self {
            features,
            n_features_in,
            model,
        }
    }

    pub fn tag(&self) -> ClassifierTag {
        self.model.tag()
    }

    pub fn n_classes(&self) -> usize {
        self.model.n_classes()
    }

    pub fn features(&self) -> &[usize] {
        &self.features
    }

    pub fn supports_proba(&self) -> bool {
        self.model.supports_proba()
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        let selected = self.select(x)?;
        self.model.predict(selected.view())
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let selected = self.select(x)?;
        self.model.predict_proba(selected.view())
    }

    /// Importances over the full input width; unselected features score zero.
    ///
    /// Models without their own notion of importance spread it uniformly.
    pub fn feature_importances(&self) -> Array1<f64> {
        let mut full = Array1::zeros(self.n_features_in);
        let selected = self.model.feature_importances().unwrap_or_else(|| {
            let n = self.features.len().max(1) as f64;
            Array1::from_elem(self.features.len(), 1.0 / n)
        });
        for (&column, &importance) in self.features.iter().zip(selected.iter()) {
            full[column] = importance;
        }
        full
    }

    /// Non-zero importances as `(column, importance)`, highest first
    pub fn feature_ranking(&self) -> Vec<(usize, f64)> {
        self.feature_importances()
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, importance)| importance > 0.0)
            .sorted_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)))
            .collect()
    }

    fn select(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features_in {
            return Err(BenchError::Shape(format!(
                "{} was fitted on {} features but received {}",
                self.tag(),
                self.n_features_in,
                x.ncols()
            )));
        }
        NDArrayOperations::select_columns(x, &self.features)
    }
}

/// Mapping between canonical class ids and the classes seen in training
#[derive(Debug, Clone)]
pub(crate) struct ClassIndex {
    present: Vec<usize>,
    n_classes: usize,
}

impl ClassIndex {
    pub(crate) fn from_labels(labels: &Array1<usize>, n_classes: usize) -> Self {
        let counts = NDArrayOperations::class_counts(labels, n_classes);
        let present = counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(class, _)| class)
            .collect();
        Self { present, n_classes }
    }

    pub(crate) fn n_present(&self) -> usize {
        self.present.len()
    }

    pub(crate) fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Canonical class id for a compact index
    pub(crate) fn decode(&self, compact: usize) -> usize {
        self.present[compact]
    }

    /// Compact indices for canonical labels; labels must all be present
    pub(crate) fn encode(&self, labels: &Array1<usize>) -> Vec<usize> {
        labels
            .iter()
            .map(|label| self.present.binary_search(label).unwrap_or(0))
            .collect()
    }

    /// Widen compact probability columns to one column per canonical class
    pub(crate) fn expand(&self, compact: &Array2<f64>) -> Array2<f64> {
        let mut full = Array2::zeros((compact.nrows(), self.n_classes));
        for (j, &class) in self.present.iter().enumerate() {
            full.column_mut(class).assign(&compact.column(j));
        }
        full
    }

    pub(crate) fn require_two(&self, tag: ClassifierTag) -> Result<()> {
        if self.present.len() < 2 {
            return Err(BenchError::fit(
                tag,
                format!(
                    "training labels contain {} distinct class(es); at least 2 are required",
                    self.present.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Common input validation for the fit routines
pub(crate) fn validate_training_data(
    tag: ClassifierTag,
    features: ArrayView2<f64>,
    targets: &Array1<usize>,
    n_classes: usize,
) -> Result<()> {
    if features.nrows() != targets.len() {
        return Err(BenchError::fit(
            tag,
            format!(
                "features and targets must have same number of samples: {} vs {}",
                features.nrows(),
                targets.len()
            ),
        ));
    }
    if features.is_empty() || targets.is_empty() {
        return Err(BenchError::fit(tag, "features and targets cannot be empty"));
    }
    if let Some(bad) = targets.iter().find(|&&t| t >= n_classes) {
        return Err(BenchError::fit(
            tag,
            format!("label {} outside of {} classes", bad, n_classes),
        ));
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(BenchError::fit(tag, "features contain non-finite values"));
    }
    Ok(())
}

/// Row-major copy into a smartcore matrix
pub(crate) fn to_dense(tag: ClassifierTag, x: ArrayView2<f64>) -> Result<DenseMatrix<f64>> {
    DenseMatrix::new(x.nrows(), x.ncols(), x.iter().copied().collect(), false)
        .map_err(|e| BenchError::fit(tag, e))
}

/// Argmax over probability columns, as canonical class ids
pub(crate) fn labels_from_proba(proba: &Array2<f64>) -> Array1<usize> {
    NDArrayOperations::argmax_rows(proba)
}

/// Squared euclidean distance between two rows
pub(crate) fn squared_distance(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Column sums of a matrix
pub(crate) fn column_sums(m: &Array2<f64>) -> Array1<f64> {
    m.sum_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_index_expand_and_decode() {
        let labels = array![3usize, 1, 3, 1];
        let index = ClassIndex::from_labels(&labels, 4);
        assert_eq!(index.n_present(), 2);
        assert_eq!(index.encode(&labels), vec![1, 0, 1, 0]);
        assert_eq!(index.decode(1), 3);

        let compact = array![[0.25, 0.75]];
        let full = index.expand(&compact);
        assert_eq!(full.row(0).to_vec(), vec![0.0, 0.25, 0.0, 0.75]);
    }

    #[test]
    fn test_class_index_requires_two_classes() {
        let labels = array![2usize, 2, 2];
        let index = ClassIndex::from_labels(&labels, 3);
        assert!(index.require_two(ClassifierTag::RF).is_err());
    }
}
