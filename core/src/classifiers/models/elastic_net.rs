//! Elastic-net regression on class ids
//!
//! The regularization path is picked by k-fold cross-validation on mean
//! squared error; predictions are rounded to the nearest class id.

use super::{to_dense, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::classifiers::operations::NDArrayOperations;
use crate::classifiers::search::{grid_search, KFold};
use crate::error::{BenchError, Result};
use ndarray::{Array1, ArrayView2, Axis};
use smartcore::linalg::basic::arrays::Array as _;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::elastic_net::{ElasticNet, ElasticNetParameters};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ElasticNetParams {
    pub alphas: Vec<f64>,
    pub l1_ratios: Vec<f64>,
    pub cv_folds: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub parallel: bool,
}

impl Default for ElasticNetParams {
    fn default() -> Self {
        Self {
            alphas: NDArrayOperations::logspace(-4.0, -0.5, 50),
            l1_ratios: vec![0.1, 0.5, 0.7, 0.9, 0.95, 0.99, 1.0],
            cv_folds: 5,
            max_iter: 1000,
            tol: 1e-4,
            parallel: false,
        }
    }
}

/// Linear model over the non-constant training columns
#[derive(Debug, Clone)]
struct LinearFit {
    columns: Vec<usize>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearFit {
    fn fit(x: ArrayView2<f64>, y: &[f64], alpha: f64, l1_ratio: f64, params: &ElasticNetParams) -> Result<Self> {
        let columns: Vec<usize> = (0..x.ncols())
            .filter(|&j| {
                let column = x.column(j);
                let first = column[0];
                column.iter().any(|&v| (v - first).abs() > f64::EPSILON)
            })
            .collect();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        // zero-variance targets leave nothing for the solver to fit
        let constant_target = y.iter().all(|&v| (v - mean).abs() <= f64::EPSILON);
        if columns.is_empty() || constant_target {
            return Ok(Self {
                columns: Vec::new(),
                coefficients: Vec::new(),
                intercept: mean,
            });
        }

        let selected = x.select(Axis(1), &columns);
        let matrix = to_dense(ClassifierTag::ENET, selected.view())?;
        let parameters = ElasticNetParameters::default()
            .with_alpha(alpha)
            .with_l1_ratio(l1_ratio)
            .with_max_iter(params.max_iter)
            .with_tol(params.tol);
        let model = ElasticNet::<f64, f64, DenseMatrix<f64>, Vec<f64>>::fit(&matrix, &y.to_vec(), parameters)
            .map_err(|e| BenchError::fit(ClassifierTag::ENET, e))?;

        let coef = model.coefficients();
        let coefficients = (0..columns.len()).map(|i| *coef.get((i, 0))).collect();
        Ok(Self {
            columns,
            coefficients,
            intercept: *model.intercept(),
        })
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.axis_iter(Axis(0))
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(&j, w)| row[j] * w)
                    .sum::<f64>()
                    + self.intercept
            })
            .collect()
    }
}

pub struct ElasticNetRegressor {
    fit: LinearFit,
    n_features: usize,
    n_classes: usize,
    alpha: f64,
    l1_ratio: f64,
}

impl ElasticNetRegressor {
    pub fn fit(
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &ElasticNetParams,
    ) -> Result<Self> {
        if params.alphas.is_empty() || params.l1_ratios.is_empty() {
            return Err(BenchError::fit(
                ClassifierTag::ENET,
                "alpha and l1_ratio grids cannot be empty",
            ));
        }
        let targets: Vec<f64> = y.iter().map(|&c| c as f64).collect();
        let candidates: Vec<(f64, f64)> = params
            .l1_ratios
            .iter()
            .flat_map(|&r| params.alphas.iter().map(move |&a| (a, r)))
            .collect();
        let splits = KFold::new(params.cv_folds).split(x.nrows())?;

        // grid_search maximizes, so score by negative mean squared error
        let (best, score) = grid_search(ClassifierTag::ENET, &candidates, params.parallel, |&(alpha, l1_ratio)| {
            let mut total = 0.0;
            for (train, test) in &splits {
                let train_x = x.select(Axis(0), train);
                let train_y: Vec<f64> = train.iter().map(|&i| targets[i]).collect();
                let fit = LinearFit::fit(train_x.view(), &train_y, alpha, l1_ratio, params)?;
                let predicted = fit.predict(x.select(Axis(0), test).view());
                total += test
                    .iter()
                    .zip(predicted.iter())
                    .map(|(&i, p)| (targets[i] - p).powi(2))
                    .sum::<f64>()
                    / test.len() as f64;
            }
            Ok(-total / splits.len() as f64)
        })?;

        let (alpha, l1_ratio) = candidates[best];
        debug!(
            "ENET selected alpha={:.6}, l1_ratio={} (cv mse {:.6})",
            alpha, l1_ratio, -score
        );
        let fit = LinearFit::fit(x, &targets, alpha, l1_ratio, params)?;

        Ok(Self {
            fit,
            n_features: x.ncols(),
            n_classes,
            alpha,
            l1_ratio,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn l1_ratio(&self) -> f64 {
        self.l1_ratio
    }

    /// Raw continuous predictions
    pub fn predict_values(&self, x: ArrayView2<f64>) -> Array1<f64> {
        self.fit.predict(x)
    }
}

impl TrainedModel for ElasticNetRegressor {
    fn tag(&self) -> ClassifierTag {
        ClassifierTag::ENET
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Rounded to the nearest class id and clamped into range
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        let top = (self.n_classes - 1) as f64;
        Ok(self
            .predict_values(x)
            .mapv(|v| if v.is_finite() { v.round().clamp(0.0, top) as usize } else { 0 }))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut importance = Array1::<f64>::zeros(self.n_features);
        for (&j, w) in self.fit.columns.iter().zip(&self.fit.coefficients) {
            importance[j] = w.abs();
        }
        let sum = importance.sum();
        if sum > 0.0 {
            importance /= sum;
        }
        Some(importance)
    }
}
