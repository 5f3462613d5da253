//! RBF-kernel support vector classifier
//!
//! One binary machine per training class (one-vs-rest), each solved with
//! SMO on a precomputed Gram matrix. Probabilities come from a Platt
//! sigmoid fitted on the training decision values.

use super::{labels_from_proba, squared_distance, ClassIndex, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SvmParams {
    pub c: f64,
    pub gamma: f64,
    pub tol: f64,
    pub max_iter: usize,
    /// Fit Platt sigmoids so that `predict_proba` is available
    pub probability: bool,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: 1e-3,
            tol: 1e-3,
            max_iter: 100_000,
            probability: true,
        }
    }
}

struct BinaryMachine {
    support_vectors: Array2<f64>,
    /// `alpha_i * y_i` for every support vector
    coef: Vec<f64>,
    rho: f64,
    platt: Option<(f64, f64)>,
}

impl BinaryMachine {
    fn decision(&self, sample: ArrayView1<f64>, gamma: f64) -> f64 {
        self.support_vectors
            .axis_iter(Axis(0))
            .zip(&self.coef)
            .map(|(sv, c)| c * (-gamma * squared_distance(sv, sample)).exp())
            .sum::<f64>()
            - self.rho
    }
}

pub struct SupportVectorClassifier {
    classes: ClassIndex,
    machines: Vec<BinaryMachine>,
    gamma: f64,
}

impl SupportVectorClassifier {
    pub fn fit(
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &SvmParams,
    ) -> Result<Self> {
        let classes = ClassIndex::from_labels(y, n_classes);
        classes.require_two(ClassifierTag::SVM)?;
        let compact = classes.encode(y);
        let gram = rbf_gram(x, params.gamma);

        let machines = (0..classes.n_present())
            .map(|class| {
                let signs: Vec<f64> = compact
                    .iter()
                    .map(|&c| if c == class { 1.0 } else { -1.0 })
                    .collect();
                let solution = smo(&gram, &signs, params);

                let support: Vec<usize> = (0..signs.len())
                    .filter(|&i| solution.alpha[i] > 0.0)
                    .collect();
                let coef = support
                    .iter()
                    .map(|&i| solution.alpha[i] * signs[i])
                    .collect();

                let platt = if params.probability {
                    let decisions: Vec<f64> = (0..signs.len())
                        .map(|i| {
                            support
                                .iter()
                                .map(|&j| solution.alpha[j] * signs[j] * gram[(j, i)])
                                .sum::<f64>()
                                - solution.rho
                        })
                        .collect();
                    Some(fit_platt(&decisions, &signs))
                } else {
                    None
                };

                BinaryMachine {
                    support_vectors: x.select(Axis(0), &support),
                    coef,
                    rho: solution.rho,
                    platt,
                }
            })
            .collect();

        Ok(Self {
            classes,
            machines,
            gamma: params.gamma,
        })
    }

    /// One-vs-rest decision values, one column per training class
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut scores = Array2::zeros((x.nrows(), self.machines.len()));
        for (sample, mut row) in x.axis_iter(Axis(0)).zip(scores.axis_iter_mut(Axis(0))) {
            for (out, machine) in row.iter_mut().zip(&self.machines) {
                *out = machine.decision(sample, self.gamma);
            }
        }
        scores
    }

    pub fn n_support(&self) -> usize {
        self.machines.iter().map(|m| m.coef.len()).sum()
    }
}

impl TrainedModel for SupportVectorClassifier {
    fn tag(&self) -> ClassifierTag {
        ClassifierTag::SVM
    }

    fn n_classes(&self) -> usize {
        self.classes.n_classes()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        let compact = labels_from_proba(&self.decision_function(x));
        Ok(compact.mapv(|c| self.classes.decode(c)))
    }

    fn supports_proba(&self) -> bool {
        self.machines.iter().all(|m| m.platt.is_some())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.supports_proba() {
            return Err(crate::error::BenchError::ProbabilitiesUnavailable {
                tag: self.tag().to_string(),
            });
        }
        let decisions = self.decision_function(x);
        let k = self.machines.len();
        let mut compact = Array2::<f64>::zeros(decisions.raw_dim());
        for (scores, mut row) in decisions.axis_iter(Axis(0)).zip(compact.axis_iter_mut(Axis(0))) {
            for ((out, &f), machine) in row.iter_mut().zip(scores.iter()).zip(&self.machines) {
                if let Some((a, b)) = machine.platt {
                    *out = sigmoid_probability(f, a, b);
                }
            }
            let sum = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|p| p / sum);
            } else {
                row.fill(1.0 / k as f64);
            }
        }
        Ok(self.classes.expand(&compact))
    }
}

fn rbf_gram(x: ArrayView2<f64>, gamma: f64) -> Array2<f64> {
    let n = x.nrows();
    let mut gram = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        gram[(i, i)] = 1.0;
        for j in (i + 1)..n {
            let k = (-gamma * squared_distance(x.row(i), x.row(j))).exp();
            gram[(i, j)] = k;
            gram[(j, i)] = k;
        }
    }
    gram
}

struct SmoSolution {
    alpha: Vec<f64>,
    rho: f64,
}

/// Dual solver using maximal violating pair working-set selection
fn smo(gram: &Array2<f64>, y: &[f64], params: &SvmParams) -> SmoSolution {
    let n = y.len();
    let c = params.c;
    let mut alpha = vec![0.0; n];
    // gradient of the dual objective, starts at -1
    let mut grad = vec![-1.0; n];

    let in_up = |a: f64, yi: f64| (yi > 0.0 && a < c) || (yi < 0.0 && a > 0.0);
    let in_low = |a: f64, yi: f64| (yi > 0.0 && a > 0.0) || (yi < 0.0 && a < c);

    let mut iterations = 0;
    loop {
        let mut i = None;
        let mut g_max = f64::NEG_INFINITY;
        let mut j = None;
        let mut g_min = f64::INFINITY;
        for t in 0..n {
            let value = -y[t] * grad[t];
            if in_up(alpha[t], y[t]) && value > g_max {
                g_max = value;
                i = Some(t);
            }
            if in_low(alpha[t], y[t]) && value < g_min {
                g_min = value;
                j = Some(t);
            }
        }

        let (i, j) = match (i, j) {
            (Some(i), Some(j)) if g_max - g_min >= params.tol => (i, j),
            _ => break,
        };
        if iterations >= params.max_iter {
            warn!(
                "SVM solver reached max_iter={} before converging",
                params.max_iter
            );
            break;
        }
        iterations += 1;

        let (old_i, old_j) = (alpha[i], alpha[j]);
        let quad = (gram[(i, i)] + gram[(j, j)] - 2.0 * gram[(i, j)]).max(1e-12);

        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let delta_i = alpha[i] - old_i;
        let delta_j = alpha[j] - old_j;
        for k in 0..n {
            // Q_ik = y_i y_k K_ik
            grad[k] += y[k] * (y[i] * gram[(i, k)] * delta_i + y[j] * gram[(j, k)] * delta_j);
        }
    }

    SmoSolution {
        rho: compute_rho(&alpha, &grad, y, c),
        alpha,
    }
}

fn compute_rho(alpha: &[f64], grad: &[f64], y: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;

    for t in 0..y.len() {
        let yg = y[t] * grad[t];
        let at_upper = alpha[t] >= c;
        let at_lower = alpha[t] <= 0.0;
        if at_upper {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if at_lower {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}

/// Fit `P(y=1|f) = 1 / (1 + exp(A f + B))` with a regularized Newton method
fn fit_platt(decisions: &[f64], signs: &[f64]) -> (f64, f64) {
    let prior1 = signs.iter().filter(|&&s| s > 0.0).count() as f64;
    let prior0 = signs.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = signs
        .iter()
        .map(|&s| if s > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let fapb = f * a + b;
                if fapb >= 0.0 {
                    t * fapb + (1.0 + (-fapb).exp()).ln()
                } else {
                    (t - 1.0) * fapb + (1.0 + fapb.exp()).ln()
                }
            })
            .sum()
    };

    let sigma = 1e-12;
    let min_step = 1e-10;
    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    for _ in 0..100 {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (sigma, sigma, 0.0, 0.0, 0.0);
        for (&f, &t) in decisions.iter().zip(&targets) {
            let fapb = f * a + b;
            let (p, q) = if fapb >= 0.0 {
                let e = (-fapb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fapb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }
        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= min_step {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < min_step {
            break;
        }
    }
    (a, b)
}

fn sigmoid_probability(f: f64, a: f64, b: f64) -> f64 {
    let fapb = f * a + b;
    if fapb >= 0.0 {
        let e = (-fapb).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + fapb.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [1.0, 1.0],
            [0.9, 1.0],
            [1.0, 0.9],
            [0.9, 0.9],
        ];
        let y = array![0usize, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_svm_separates_blobs() {
        let (x, y) = blobs();
        let params = SvmParams {
            c: 10.0,
            gamma: 1.0,
            ..Default::default()
        };
        let svm = SupportVectorClassifier::fit(x.view(), &y, 2, &params).unwrap();
        assert_eq!(svm.predict(x.view()).unwrap(), y);
        assert!(svm.n_support() > 0);

        let proba = svm.predict_proba(x.view()).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_svm_without_probability() {
        let (x, y) = blobs();
        let params = SvmParams {
            c: 10.0,
            gamma: 1.0,
            probability: false,
            ..Default::default()
        };
        let svm = SupportVectorClassifier::fit(x.view(), &y, 3, &params).unwrap();
        assert!(!svm.supports_proba());
        assert!(svm.predict_proba(x.view()).is_err());
    }

    #[test]
    fn test_two_point_machine_has_closed_form_solution() {
        let x = array![[0.0], [1.0]];
        let y = array![0usize, 1];
        let params = SvmParams {
            c: 10.0,
            gamma: 1.0,
            tol: 1e-9,
            probability: false,
            ..Default::default()
        };
        let svm = SupportVectorClassifier::fit(x.view(), &y, 2, &params).unwrap();

        // both points are margin vectors with alpha = 1 / (1 - exp(-gamma)) and rho = 0
        let alpha = 1.0 / (1.0 - (-1.0f64).exp());
        let machine = &svm.machines[0];
        assert!((machine.coef[0] - alpha).abs() < 1e-9);
        assert!((machine.coef[1] + alpha).abs() < 1e-9);
        assert!(machine.rho.abs() < 1e-9);

        let scores = svm.decision_function(array![[0.0], [1.0], [0.5]].view());
        assert!((scores[(0, 0)] - 1.0).abs() < 1e-9);
        assert!((scores[(1, 0)] + 1.0).abs() < 1e-9);
        assert!(scores[(2, 0)].abs() < 1e-9);
    }

    #[test]
    fn test_platt_is_increasing_in_decision_value() {
        let decisions = [-2.0, -1.5, -1.0, 1.0, 1.5, 2.0];
        let signs = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        let (a, b) = fit_platt(&decisions, &signs);
        assert!(a < 0.0);
        assert!(sigmoid_probability(2.0, a, b) > sigmoid_probability(-2.0, a, b));
    }
}
