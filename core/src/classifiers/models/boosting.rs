//! Multiclass gradient boosting on the multinomial deviance
//!
//! Each stage fits one regression tree per class to the residuals `y - p`
//! and replaces the leaf means with a one-step Newton estimate.

use super::tree::{RegressionTree, TreeParams};
use super::{labels_from_proba, ClassIndex, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::classifiers::operations::NDArrayOperations;
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 1000,
            learning_rate: 1.0,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 1,
        }
    }
}

pub struct GradientBoosting {
    classes: ClassIndex,
    initial: Array1<f64>,
    /// `stages[m][k]` is the tree of stage `m` for compact class `k`
    stages: Vec<Vec<RegressionTree>>,
    learning_rate: f64,
    n_features: usize,
}

impl GradientBoosting {
    pub fn fit(
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &GradientBoostingParams,
    ) -> Result<Self> {
        let classes = ClassIndex::from_labels(y, n_classes);
        classes.require_two(ClassifierTag::GB)?;
        let k = classes.n_present();
        let n = x.nrows();
        let compact = classes.encode(y);

        // log class priors
        let mut initial = Array1::<f64>::zeros(k);
        for &c in &compact {
            initial[c] += 1.0;
        }
        initial.mapv_inplace(|count| (count / n as f64).ln());

        let mut raw = Array2::<f64>::zeros((n, k));
        raw.axis_iter_mut(Axis(0))
            .for_each(|mut row| row.assign(&initial));

        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
        };
        let factor = (k as f64 - 1.0) / k as f64;
        let mut stages = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let proba = NDArrayOperations::softmax_rows(&raw);

            let trees: Vec<RegressionTree> = (0..k)
                .into_par_iter()
                .map(|class| {
                    let residual: Vec<f64> = (0..n)
                        .map(|i| {
                            let target = if compact[i] == class { 1.0 } else { 0.0 };
                            target - proba[(i, class)]
                        })
                        .collect();
                    let mut tree =
                        RegressionTree::fit(x, &residual, (0..n).collect(), &tree_params);
                    newton_leaf_update(&mut tree, x, &residual, factor);
                    tree
                })
                .collect();

            for (class, tree) in trees.iter().enumerate() {
                for (i, sample) in x.axis_iter(Axis(0)).enumerate() {
                    raw[(i, class)] += params.learning_rate * tree.predict_one(sample);
                }
            }
            stages.push(trees);
        }

        Ok(Self {
            classes,
            initial,
            stages,
            learning_rate: params.learning_rate,
            n_features: x.ncols(),
        })
    }

    fn raw_scores(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let k = self.classes.n_present();
        let mut raw = Array2::<f64>::zeros((x.nrows(), k));
        for (sample, mut row) in x.axis_iter(Axis(0)).zip(raw.axis_iter_mut(Axis(0))) {
            row.assign(&self.initial);
            for trees in &self.stages {
                for (class, tree) in trees.iter().enumerate() {
                    row[class] += self.learning_rate * tree.predict_one(sample);
                }
            }
        }
        raw
    }
}

/// `(K-1)/K * sum(r) / sum(|r| (1 - |r|))` per leaf
fn newton_leaf_update(tree: &mut RegressionTree, x: ArrayView2<f64>, residual: &[f64], factor: f64) {
    let mut sums: HashMap<usize, (f64, f64)> = HashMap::new();
    for (i, sample) in x.axis_iter(Axis(0)).enumerate() {
        let entry = sums.entry(tree.apply(sample)).or_insert((0.0, 0.0));
        let r = residual[i];
        entry.0 += r;
        entry.1 += r.abs() * (1.0 - r.abs());
    }
    for (leaf, (numerator, denominator)) in sums {
        let value = if denominator.abs() < 1e-150 {
            0.0
        } else {
            factor * numerator / denominator
        };
        tree.set_leaf_value(leaf, value);
    }
}

impl TrainedModel for GradientBoosting {
    fn tag(&self) -> ClassifierTag {
        ClassifierTag::GB
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
        let compact = NDArrayOperations::softmax_rows(&self.raw_scores(x));
        Ok(self.classes.expand(&compact))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in self.stages.iter().flatten() {
            total += tree.raw_importances();
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_boosting_fits_separable_data() {
        let x = array![[0.9, 0.1], [0.8, 0.2], [0.2, 0.8], [0.1, 0.9], [0.5, 0.5], [0.55, 0.45]];
        let y = array![0usize, 0, 2, 2, 1, 1];
        let params = GradientBoostingParams {
            n_estimators: 20,
            learning_rate: 0.5,
            max_depth: 3,
            min_samples_split: 2,
            ..Default::default()
        };
        let model = GradientBoosting::fit(x.view(), &y, 3, &params).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);

        let proba = model.predict_proba(x.view()).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_stage_newton_step() {
        let x = array![[0.0], [1.0]];
        let y = array![0usize, 1];
        let params = GradientBoostingParams {
            n_estimators: 1,
            learning_rate: 1.0,
            max_depth: 1,
            min_samples_split: 2,
            ..Default::default()
        };
        let model = GradientBoosting::fit(x.view(), &y, 2, &params).unwrap();

        // residuals +-0.5 give leaf values 1/2 * 0.5 / 0.25 = +-1
        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        let proba = model.predict_proba(x.view()).unwrap();
        assert!((proba[(0, 0)] - expected).abs() < 1e-12);
        assert!((proba[(1, 1)] - expected).abs() < 1e-12);
        assert!((proba[(0, 1)] - (1.0 - expected)).abs() < 1e-12);
    }

    #[test]
    fn test_boosting_needs_two_classes() {
        let x = array![[0.1, 0.9], [0.2, 0.8]];
        let y = array![1usize, 1];
        assert!(GradientBoosting::fit(x.view(), &y, 2, &GradientBoostingParams::default()).is_err());
    }
}
