//! Multinomial logistic regression with L1 or L2 penalty
//!
//! The L2 model is smartcore's LBFGS `LogisticRegression`, which minimizes
//! `sum cross-entropy + alpha / 2 * |W|^2`; `alpha = 1 / C` matches the usual
//! `C`-weighted form. smartcore has no L1 solver, so the L1 model minimizes
//! `mean cross-entropy + lambda * |W|_1` with `lambda = 1 / (C n)` by
//! proximal gradient descent with backtracking. Intercepts are not penalized.

use super::{column_sums, labels_from_proba, to_dense, ClassIndex, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::classifiers::operations::NDArrayOperations;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array as _;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{
    LogisticRegression as SmartcoreLogistic, LogisticRegressionParameters,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

#[derive(Debug, Clone)]
pub struct LogisticParams {
    pub penalty: Penalty,
    /// Inverse regularization strength
    pub c: f64,
    /// Proximal solver limits; the LBFGS solver uses its own
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            penalty: Penalty::L2,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
        }
    }
}

pub struct LogisticRegression {
    tag: ClassifierTag,
    classes: ClassIndex,
    /// `n_features x n_present_classes`
    weights: Array2<f64>,
    intercept: Array1<f64>,
}

/// Smooth part of the L1 objective over one training set
struct Objective<'x, 't> {
    x: ArrayView2<'x, f64>,
    targets: &'t Array2<f64>,
    lambda: f64,
}

impl Objective<'_, '_> {
    fn probabilities(&self, w: &Array2<f64>, b: &Array1<f64>) -> Array2<f64> {
        let logits = self.x.dot(w) + b;
        NDArrayOperations::softmax_rows(&logits)
    }

    /// Mean cross-entropy
    fn value(&self, w: &Array2<f64>, b: &Array1<f64>) -> f64 {
        let proba = self.probabilities(w, b);
        let n = self.x.nrows() as f64;
        -proba
            .iter()
            .zip(self.targets.iter())
            .filter(|(_, &t)| t > 0.0)
            .map(|(&p, _)| p.max(1e-300).ln())
            .sum::<f64>()
            / n
    }

    fn gradient(&self, w: &Array2<f64>, b: &Array1<f64>) -> (Array2<f64>, Array1<f64>) {
        let n = self.x.nrows() as f64;
        let residual = (self.probabilities(w, b) - self.targets) / n;
        (self.x.t().dot(&residual), column_sums(&residual))
    }

    fn penalty_value(&self, w: &Array2<f64>) -> f64 {
        self.lambda * w.mapv(f64::abs).sum()
    }

    /// Soft thresholding
    fn prox(&self, w: Array2<f64>, step: f64) -> Array2<f64> {
        let threshold = step * self.lambda;
        w.mapv(|v| v.signum() * (v.abs() - threshold).max(0.0))
    }
}

impl LogisticRegression {
    pub fn fit(
        tag: ClassifierTag,
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &LogisticParams,
    ) -> Result<Self> {
        let classes = ClassIndex::from_labels(y, n_classes);
        classes.require_two(tag)?;
        let compact = Array1::from(classes.encode(y));

        let (weights, intercept) = match params.penalty {
            Penalty::L1 => fit_l1(tag, x, &compact, classes.n_present(), params)?,
            Penalty::L2 => fit_l2(tag, x, &compact, classes.n_present(), params)?,
        };

        Ok(Self {
            tag,
            classes,
            weights,
            intercept,
        })
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> &Array1<f64> {
        &self.intercept
    }
}

/// Proximal gradient descent with a backtracking step size
fn fit_l1(
    tag: ClassifierTag,
    x: ArrayView2<f64>,
    compact: &Array1<usize>,
    k: usize,
    params: &LogisticParams,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let targets = NDArrayOperations::one_hot_encode(compact, k)?;
    let objective = Objective {
        x,
        targets: &targets,
        lambda: 1.0 / (params.c * x.nrows() as f64),
    };

    let mut w = Array2::<f64>::zeros((x.ncols(), k));
    let mut b = Array1::<f64>::zeros(k);
    let mut step = 1.0;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < params.max_iter {
        iterations += 1;
        let f = objective.value(&w, &b);
        let (gw, gb) = objective.gradient(&w, &b);

        let (new_w, new_b) = loop {
            let candidate_w = objective.prox(&w - &(&gw * step), step);
            let candidate_b = &b - &(&gb * step);
            let dw = &candidate_w - &w;
            let db = &candidate_b - &b;
            let bound = f
                + (&gw * &dw).sum()
                + (&gb * &db).sum()
                + (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()) / (2.0 * step);
            if objective.value(&candidate_w, &candidate_b) <= bound + 1e-12 || step < 1e-12 {
                break (candidate_w, candidate_b);
            }
            step *= 0.5;
        };

        let change = (&new_w - &w)
            .iter()
            .chain((&new_b - &b).iter())
            .fold(0.0f64, |m, v| m.max(v.abs()));
        w = new_w;
        b = new_b;
        if change < params.tol {
            converged = true;
            break;
        }
        step *= 1.25;
    }

    if converged {
        debug!(
            "{} converged after {} iterations, objective {:.6}",
            tag,
            iterations,
            objective.value(&w, &b) + objective.penalty_value(&w)
        );
    } else {
        warn!("{} did not converge within max_iter={}", tag, params.max_iter);
    }
    Ok((w, b))
}

/// smartcore LBFGS fit, unpacked into one softmax column per class.
///
/// smartcore keeps a single logit row for two classes; the first class
/// then gets a zero column so the softmax reduces to the sigmoid.
fn fit_l2(
    tag: ClassifierTag,
    x: ArrayView2<f64>,
    compact: &Array1<usize>,
    k: usize,
    params: &LogisticParams,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let matrix = to_dense(tag, x)?;
    let labels: Vec<u32> = compact.iter().map(|&c| c as u32).collect();
    let parameters = LogisticRegressionParameters::default().with_alpha(1.0 / params.c);
    let model = SmartcoreLogistic::<f64, u32, DenseMatrix<f64>, Vec<u32>>::fit(&matrix, &labels, parameters)
        .map_err(|e| BenchError::fit(tag, e))?;

    let coefficients = model.coefficients();
    let intercepts = model.intercept();
    let p = x.ncols();
    let mut weights = Array2::<f64>::zeros((p, k));
    let mut intercept = Array1::<f64>::zeros(k);
    if k == 2 {
        for j in 0..p {
            weights[(j, 1)] = *coefficients.get((0, j));
        }
        intercept[1] = *intercepts.get((0, 0));
    } else {
        for class in 0..k {
            for j in 0..p {
                weights[(j, class)] = *coefficients.get((class, j));
            }
            intercept[class] = *intercepts.get((class, 0));
        }
    }
    debug!("{} fitted by LBFGS with alpha={}", tag, 1.0 / params.c);
    Ok((weights, intercept))
}

impl TrainedModel for LogisticRegression {
    fn tag(&self) -> ClassifierTag {
        self.tag
    }

    fn n_classes(&self) -> usize {
        self.classes.n_classes()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(labels_from_proba(&self.predict_proba(x)?))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let logits = x.dot(&self.weights) + &self.intercept;
        Ok(self.classes.expand(&NDArrayOperations::softmax_rows(&logits)))
    }

    /// Mean absolute coefficient per feature, normalized to sum to one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut importance = self.weights.mapv(f64::abs).sum_axis(Axis(1));
        let sum = importance.sum();
        if sum > 0.0 {
            importance /= sum;
        }
        Some(importance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [3.0, 0.0],
            [2.5, 0.5],
            [2.8, 0.2],
            [0.0, 3.0],
            [0.5, 2.5],
            [0.2, 2.8],
        ];
        (x, array![0usize, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_l2_logistic_fits_toy_data() {
        let (x, y) = toy();
        let model =
            LogisticRegression::fit(ClassifierTag::LR2, x.view(), &y, 2, &LogisticParams::default())
                .unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
        let proba = model.predict_proba(x.view()).unwrap();
        assert!(proba[(0, 0)] > 0.5);
        assert!((proba.row(3).sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_l2_probabilities_agree_with_smartcore_labels() {
        let x = array![
            [0.9, 0.1],
            [0.8, 0.3],
            [0.1, 0.9],
            [0.2, 0.7],
            [0.5, 0.5],
            [0.6, 0.4],
        ];
        let y = array![0usize, 0, 2, 2, 1, 1];
        let params = LogisticParams::default();
        let model = LogisticRegression::fit(ClassifierTag::LR2, x.view(), &y, 3, &params).unwrap();

        let matrix = to_dense(ClassifierTag::LR2, x.view()).unwrap();
        let labels: Vec<u32> = vec![0, 0, 2, 2, 1, 1];
        let reference = SmartcoreLogistic::<f64, u32, DenseMatrix<f64>, Vec<u32>>::fit(
            &matrix,
            &labels,
            LogisticRegressionParameters::default().with_alpha(1.0),
        )
        .unwrap();
        let expected: Vec<usize> = reference
            .predict(&matrix)
            .unwrap()
            .into_iter()
            .map(|c| c as usize)
            .collect();
        assert_eq!(model.predict(x.view()).unwrap().to_vec(), expected);
    }

    #[test]
    fn test_l1_strong_penalty_zeroes_weights() {
        let (x, y) = toy();
        let params = LogisticParams {
            penalty: Penalty::L1,
            c: 1e-4,
            ..Default::default()
        };
        let model = LogisticRegression::fit(ClassifierTag::LR, x.view(), &y, 2, &params).unwrap();
        assert!(model.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_l1_zero_weights_leave_class_priors() {
        let x = array![[1.0, 0.0], [0.9, 0.2], [0.8, 0.1], [0.0, 1.0]];
        let y = array![0usize, 0, 0, 1];
        let params = LogisticParams {
            penalty: Penalty::L1,
            c: 1e-4,
            ..Default::default()
        };
        let model = LogisticRegression::fit(ClassifierTag::LR, x.view(), &y, 2, &params).unwrap();

        // intercept-only optimum reproduces the training frequencies
        let proba = model.predict_proba(x.view()).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row[0] - 0.75).abs() < 1e-4);
            assert!((row[1] - 0.25).abs() < 1e-4);
        }
    }

    #[test]
    fn test_unseen_class_gets_zero_probability() {
        let (x, y) = toy();
        let model =
            LogisticRegression::fit(ClassifierTag::LR2, x.view(), &y, 3, &LogisticParams::default())
                .unwrap();
        let proba = model.predict_proba(x.view()).unwrap();
        assert_eq!(proba.ncols(), 3);
        assert!(proba.column(2).iter().all(|&p| p == 0.0));
    }
}
