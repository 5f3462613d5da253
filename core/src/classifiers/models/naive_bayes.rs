//! Multinomial naive Bayes

use super::{labels_from_proba, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::classifiers::operations::NDArrayOperations;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

#[derive(Debug, Clone)]
pub struct NaiveBayesParams {
    /// Additive smoothing
    pub alpha: f64,
    /// Learn class priors; uniform over training classes otherwise
    pub fit_prior: bool,
}

impl Default for NaiveBayesParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            fit_prior: true,
        }
    }
}

pub struct MultinomialNaiveBayes {
    /// `n_classes`, `-inf` for classes absent from training
    class_log_prior: Array1<f64>,
    /// `n_classes x n_features`
    feature_log_prob: Array2<f64>,
}

impl MultinomialNaiveBayes {
    pub fn fit(
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &NaiveBayesParams,
    ) -> Result<Self> {
        if x.iter().any(|&v| v < 0.0) {
            return Err(BenchError::fit(
                ClassifierTag::MB,
                "negative feature values are not allowed",
            ));
        }
        if params.alpha <= 0.0 {
            return Err(BenchError::fit(ClassifierTag::MB, "alpha must be positive"));
        }

        let counts = NDArrayOperations::class_counts(y, n_classes);
        let n_seen = counts.iter().filter(|&&c| c > 0).count() as f64;
        let n = y.len() as f64;

        let mut feature_counts = Array2::<f64>::zeros((n_classes, x.ncols()));
        for (sample, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let mut row = feature_counts.row_mut(label);
            row += &sample;
        }

        let class_log_prior = counts
            .iter()
            .map(|&c| match c {
                0 => f64::NEG_INFINITY,
                c if params.fit_prior => (c as f64 / n).ln(),
                _ => -(n_seen.ln()),
            })
            .collect();

        let mut feature_log_prob = feature_counts.mapv(|c| c + params.alpha);
        for mut row in feature_log_prob.axis_iter_mut(Axis(0)) {
            let total = row.sum();
            row.mapv_inplace(|c| (c / total).ln());
        }

        Ok(Self {
            class_log_prior,
            feature_log_prob,
        })
    }

    fn joint_log_likelihood(&self, x: ArrayView2<f64>) -> Array2<f64> {
        x.dot(&self.feature_log_prob.t()) + &self.class_log_prior
    }
}

impl TrainedModel for MultinomialNaiveBayes {
    fn tag(&self) -> ClassifierTag {
        ClassifierTag::MB
    }

    fn n_classes(&self) -> usize {
        self.class_log_prior.len()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(labels_from_proba(&self.joint_log_likelihood(x)))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(NDArrayOperations::softmax_rows(&self.joint_log_likelihood(x)))
    }

    /// Spread of the per-class log probabilities of each feature
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let seen: Vec<usize> = self
            .class_log_prior
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .map(|(c, _)| c)
            .collect();
        let rows = self.feature_log_prob.select(Axis(0), &seen);
        let mut spread = rows.map_axis(Axis(0), |column| {
            let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
            max - min
        });
        let sum = spread.sum();
        if sum > 0.0 {
            spread /= sum;
        }
        Some(spread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_multinomial_nb_matches_hand_computation() {
        let x = array![[2.0, 0.0], [0.0, 2.0]];
        let y = array![0usize, 1];
        let nb = MultinomialNaiveBayes::fit(x.view(), &y, 2, &NaiveBayesParams::default()).unwrap();

        // class 0 feature probabilities: (2+1)/4, (0+1)/4
        assert!((nb.feature_log_prob[(0, 0)] - (0.75f64).ln()).abs() < 1e-12);
        assert!((nb.feature_log_prob[(0, 1)] - (0.25f64).ln()).abs() < 1e-12);

        let proba = nb.predict_proba(array![[1.0, 0.0]].view()).unwrap();
        assert!((proba[(0, 0)] - 0.75).abs() < 1e-12);
        assert_eq!(nb.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_unseen_class_has_zero_probability() {
        let x = array![[1.0, 0.0], [0.0, 1.0]];
        let y = array![0usize, 2];
        let nb = MultinomialNaiveBayes::fit(x.view(), &y, 3, &NaiveBayesParams::default()).unwrap();
        let proba = nb.predict_proba(x.view()).unwrap();
        assert!(proba.column(1).iter().all(|&p| p == 0.0));
        assert_eq!(nb.predict(x.view()).unwrap(), array![0usize, 2]);
    }

    #[test]
    fn test_negative_features_rejected() {
        let x = array![[1.0, -0.5], [0.0, 1.0]];
        let y = array![0usize, 1];
        assert!(MultinomialNaiveBayes::fit(x.view(), &y, 2, &NaiveBayesParams::default()).is_err());
    }
}
