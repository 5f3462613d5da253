//! Feed-forward neural network classifier
//!
//! ReLU hidden layers, softmax output, cross-entropy loss with L2 penalty,
//! trained with Adam on shuffled mini-batches.

use super::{column_sums, labels_from_proba, ClassIndex, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::classifiers::operations::NDArrayOperations;
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct MlpParams {
    pub hidden_layer_sizes: Vec<usize>,
    /// L2 penalty
    pub alpha: f64,
    pub batch_size: usize,
    pub learning_rate_init: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![256, 256],
            alpha: 1e-4,
            batch_size: 200,
            learning_rate_init: 1e-3,
            max_iter: 1000,
            tol: 1e-4,
            n_iter_no_change: 10,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// First and second moment estimates for one layer
struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

pub struct MlpClassifier {
    classes: ClassIndex,
    layers: Vec<Dense>,
    n_iter: usize,
    final_loss: f64,
}

impl MlpClassifier {
    pub fn fit(
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &MlpParams,
    ) -> Result<Self> {
        let classes = ClassIndex::from_labels(y, n_classes);
        classes.require_two(ClassifierTag::MLP)?;
        let compact = Array1::from(classes.encode(y));
        let targets = NDArrayOperations::one_hot_encode(&compact, classes.n_present())?;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let mut sizes = vec![x.ncols()];
        sizes.extend(params.hidden_layer_sizes.iter().copied());
        sizes.push(classes.n_present());
        let mut layers: Vec<Dense> = sizes
            .windows(2)
            .map(|w| glorot_uniform(w[0], w[1], &mut rng))
            .collect();
        let mut moments: Vec<Moments> = layers
            .iter()
            .map(|l| Moments {
                m_w: Array2::zeros(l.weights.raw_dim()),
                v_w: Array2::zeros(l.weights.raw_dim()),
                m_b: Array1::zeros(l.bias.len()),
                v_b: Array1::zeros(l.bias.len()),
            })
            .collect();

        let n = x.nrows();
        let batch_size = params.batch_size.clamp(1, n);
        let mut learning_rate = params.learning_rate_init;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut step = 0i32;
        let mut order: Vec<usize> = (0..n).collect();
        let mut epoch_loss = f64::NAN;
        let mut n_iter = 0;
        let mut stopped = false;

        for epoch in 0..params.max_iter {
            n_iter = epoch + 1;
            order.shuffle(&mut rng);
            let mut accumulated = 0.0;

            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = targets.select(Axis(0), batch);
                let (loss, grads) = backprop(&layers, &xb, &yb, params.alpha);
                accumulated += loss * batch.len() as f64;

                step += 1;
                let correction = (1.0 - params.beta_2.powi(step)).sqrt() / (1.0 - params.beta_1.powi(step));
                let lr_t = learning_rate * correction;
                for ((layer, moment), (gw, gb)) in layers.iter_mut().zip(&mut moments).zip(grads) {
                    adam_update(&mut layer.weights, &mut moment.m_w, &mut moment.v_w, &gw, lr_t, params);
                    adam_update(&mut layer.bias, &mut moment.m_b, &mut moment.v_b, &gb, lr_t, params);
                }
            }

            epoch_loss = accumulated / n as f64;
            if epoch_loss > best_loss - params.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }

            if no_improvement > params.n_iter_no_change {
                if learning_rate <= 1e-6 {
                    debug!("MLP stopped after {} epochs, loss {:.6}", n_iter, epoch_loss);
                    stopped = true;
                    break;
                }
                learning_rate /= 5.0;
                no_improvement = 0;
                debug!("MLP learning rate reduced to {:e}", learning_rate);
            }
        }

        if !stopped {
            warn!(
                "MLP reached max_iter={} without converging, loss {:.6}",
                params.max_iter, epoch_loss
            );
        }

        Ok(Self {
            classes,
            layers,
            n_iter,
            final_loss: epoch_loss,
        })
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn loss(&self) -> f64 {
        self.final_loss
    }
}

fn glorot_uniform(fan_in: usize, fan_out: usize, rng: &mut Xoshiro256PlusPlus) -> Dense {
    let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Dense {
        weights: Array2::from_shape_simple_fn((fan_in, fan_out), || dist.sample(&mut *rng)),
        bias: Array1::from_shape_simple_fn(fan_out, || dist.sample(&mut *rng)),
    }
}

/// Activations of every layer, input first and softmax output last
fn forward(layers: &[Dense], x: &Array2<f64>) -> Vec<Array2<f64>> {
    let mut activations = vec![x.clone()];
    for (i, layer) in layers.iter().enumerate() {
        let z = activations[i].dot(&layer.weights) + &layer.bias;
        let a = if i + 1 == layers.len() {
            NDArrayOperations::softmax_rows(&z)
        } else {
            z.mapv(|v| v.max(0.0))
        };
        activations.push(a);
    }
    activations
}

type Gradients = Vec<(Array2<f64>, Array1<f64>)>;

/// Batch loss and per-layer gradients
fn backprop(layers: &[Dense], x: &Array2<f64>, y: &Array2<f64>, alpha: f64) -> (f64, Gradients) {
    let nb = x.nrows() as f64;
    let activations = forward(layers, x);
    let output = &activations[layers.len()];

    let ce = -output
        .iter()
        .zip(y.iter())
        .filter(|(_, &t)| t > 0.0)
        .map(|(&p, _)| p.max(1e-300).ln())
        .sum::<f64>()
        / nb;
    let l2: f64 = layers.iter().map(|l| l.weights.mapv(|w| w * w).sum()).sum();
    let loss = ce + 0.5 * alpha * l2 / nb;

    let mut grads = Vec::with_capacity(layers.len());
    let mut delta = (output - y) / nb;
    for i in (0..layers.len()).rev() {
        let mut gw = activations[i].t().dot(&delta);
        gw.scaled_add(alpha / nb, &layers[i].weights);
        let gb = column_sums(&delta);
        if i > 0 {
            let mut upstream = delta.dot(&layers[i].weights.t());
            upstream.zip_mut_with(&activations[i], |d, &a| {
                if a <= 0.0 {
                    *d = 0.0;
                }
            });
            delta = upstream;
        }
        grads.push((gw, gb));
    }
    grads.reverse();
    (loss, grads)
}

fn adam_update<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f64, D>,
    m: &mut ndarray::Array<f64, D>,
    v: &mut ndarray::Array<f64, D>,
    grad: &ndarray::Array<f64, D>,
    lr_t: f64,
    params: &MlpParams,
) {
    m.zip_mut_with(grad, |m, &g| *m = params.beta_1 * *m + (1.0 - params.beta_1) * g);
    v.zip_mut_with(grad, |v, &g| *v = params.beta_2 * *v + (1.0 - params.beta_2) * g * g);
    ndarray::Zip::from(param)
        .and(&*m)
        .and(&*v)
        .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + params.epsilon));
}

impl TrainedModel for MlpClassifier {
    fn tag(&self) -> ClassifierTag {
        ClassifierTag::MLP
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
        let mut activations = forward(&self.layers, &x.to_owned());
        let output = activations.pop().unwrap_or_else(|| Array2::zeros((x.nrows(), 0)));
        Ok(self.classes.expand(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_params() -> MlpParams {
        MlpParams {
            hidden_layer_sizes: vec![8],
            learning_rate_init: 1e-2,
            max_iter: 300,
            seed: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_mlp_learns_separable_classes() {
        let x = array![
            [1.0, 0.0],
            [0.9, 0.1],
            [0.8, 0.2],
            [0.0, 1.0],
            [0.1, 0.9],
            [0.2, 0.8],
        ];
        let y = array![0usize, 0, 0, 1, 1, 1];
        let model = MlpClassifier::fit(x.view(), &y, 2, &small_params()).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), y);
        assert!(model.loss().is_finite());
    }

    #[test]
    fn test_mlp_is_deterministic_for_a_seed() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [0.5, 0.5], [0.7, 0.3]];
        let y = array![0usize, 1, 1, 0];
        let params = MlpParams {
            max_iter: 20,
            ..small_params()
        };
        let a = MlpClassifier::fit(x.view(), &y, 2, &params).unwrap();
        let b = MlpClassifier::fit(x.view(), &y, 2, &params).unwrap();
        assert_eq!(
            a.predict_proba(x.view()).unwrap(),
            b.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut layers = vec![glorot_uniform(2, 3, &mut rng), glorot_uniform(3, 2, &mut rng)];
        let x = array![[0.3, 0.7], [0.9, 0.1]];
        let y = array![[1.0, 0.0], [0.0, 1.0]];
        let (_, grads) = backprop(&layers, &x, &y, 1e-2);

        let h = 1e-6;
        layers[0].weights[(0, 1)] += h;
        let (plus, _) = backprop(&layers, &x, &y, 1e-2);
        layers[0].weights[(0, 1)] -= 2.0 * h;
        let (minus, _) = backprop(&layers, &x, &y, 1e-2);
        let numeric = (plus - minus) / (2.0 * h);
        assert!((numeric - grads[0].0[(0, 1)]).abs() < 1e-5);
    }

    #[test]
    fn test_forward_pass_reference_values() {
        let model = MlpClassifier {
            classes: ClassIndex::from_labels(&array![0usize, 1], 2),
            layers: vec![
                Dense {
                    weights: array![[1.0, -1.0]],
                    bias: array![0.0, 0.0],
                },
                Dense {
                    weights: array![[1.0, 0.0], [0.0, 1.0]],
                    bias: array![0.0, 0.0],
                },
            ],
            n_iter: 0,
            final_loss: f64::NAN,
        };

        // relu hidden [2, 0] and [0, 1] pass straight through to the logits
        let proba = model.predict_proba(array![[2.0], [-1.0]].view()).unwrap();
        assert!((proba[(0, 0)] - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-12);
        assert!((proba[(1, 1)] - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
        assert_eq!(model.predict(array![[2.0], [-1.0]].view()).unwrap(), array![0usize, 1]);
    }
}
