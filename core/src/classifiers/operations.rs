//! Numerical Array Operations and Utilities

use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

pub struct NDArrayOperations;

impl NDArrayOperations {
    /// Scale every row to relative proportions.
    ///
    /// Rows summing to exactly zero are divided by one and left unchanged.
    pub fn row_normalize(array: &Array2<f64>) -> Array2<f64> {
        let mut normalized = array.clone();
        for mut row in normalized.axis_iter_mut(Axis(0)) {
            let sum = row.sum();
            let divisor = if sum == 0.0 { 1.0 } else { sum };
            row.mapv_inplace(|x| x / divisor);
        }
        normalized
    }

    /// Apply one-hot encoding to class ids
    pub fn one_hot_encode(categorical: &Array1<usize>, n_categories: usize) -> Result<Array2<f64>> {
        let n_samples = categorical.len();
        let mut one_hot = Array2::zeros((n_samples, n_categories));

        for (i, &category) in categorical.iter().enumerate() {
            if category >= n_categories {
                return Err(BenchError::InvalidLabel {
                    index: i,
                    value: category as f64,
                    reason: format!("class id must be below {}", n_categories),
                });
            }
            one_hot[(i, category)] = 1.0;
        }

        Ok(one_hot)
    }

    /// Keep the given columns, in the given order
    pub fn select_columns(array: ArrayView2<f64>, columns: &[usize]) -> Result<Array2<f64>> {
        if let Some(&bad) = columns.iter().find(|&&c| c >= array.ncols()) {
            return Err(BenchError::Shape(format!(
                "feature index {} out of bounds for {} features",
                bad,
                array.ncols()
            )));
        }
        Ok(array.select(Axis(1), columns))
    }

    /// Shuffle samples and labels jointly with a fixed seed
    pub fn shuffle_rows(
        samples: &Array2<f64>,
        labels: &Array1<usize>,
        seed: u64,
    ) -> Result<(Array2<f64>, Array1<usize>)> {
        if samples.nrows() != labels.len() {
            return Err(BenchError::Shape(format!(
                "cannot shuffle {} samples with {} labels",
                samples.nrows(),
                labels.len()
            )));
        }
        let mut order: Vec<usize> = (0..labels.len()).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        order.shuffle(&mut rng);

        Ok((samples.select(Axis(0), &order), labels.select(Axis(0), &order)))
    }

    /// Row-wise softmax, stable against large logits and `-inf` entries
    pub fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
        let mut probs = logits.clone();
        for mut row in probs.axis_iter_mut(Axis(0)) {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if !max.is_finite() {
                let n = row.len() as f64;
                row.fill(1.0 / n);
                continue;
            }
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|x| x / sum);
        }
        probs
    }

    /// Index of the largest value in every row; ties go to the lowest index
    pub fn argmax_rows(scores: &Array2<f64>) -> Array1<usize> {
        scores
            .axis_iter(Axis(0))
            .map(|row| Self::argmax(row))
            .collect()
    }

    pub fn argmax(values: ArrayView1<f64>) -> usize {
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (i, &v) in values.iter().enumerate() {
            if v > best_value {
                best = i;
                best_value = v;
            }
        }
        best
    }

    /// `num` values evenly spaced on a log10 scale between `10^start` and `10^stop`
    pub fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
        match num {
            0 => Vec::new(),
            1 => vec![10f64.powf(start)],
            _ => {
                let step = (stop - start) / (num - 1) as f64;
                (0..num)
                    .map(|i| 10f64.powf(start + step * i as f64))
                    .collect()
            }
        }
    }

    /// Number of samples per class id
    pub fn class_counts(labels: &Array1<usize>, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for &label in labels.iter() {
            if label < n_classes {
                counts[label] += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_row_normalize_sums_to_one() {
        let x = array![[1.0, 3.0], [2.0, 2.0], [0.0, 5.0]];
        let n = NDArrayOperations::row_normalize(&x);
        for row in n.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert_eq!(n[(0, 0)], 0.25);
    }

    #[test]
    fn test_row_normalize_zero_row_unchanged() {
        let x = array![[0.0, 0.0, 0.0], [1.0, 1.0, 2.0]];
        let n = NDArrayOperations::row_normalize(&x);
        assert_eq!(n.row(0), x.row(0));
        assert!(n.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_one_hot_rejects_out_of_range() {
        let labels = array![0usize, 2, 1];
        let one_hot = NDArrayOperations::one_hot_encode(&labels, 3).unwrap();
        assert_eq!(one_hot.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
        assert!(NDArrayOperations::one_hot_encode(&labels, 2).is_err());
    }

    #[test]
    fn test_shuffle_is_joint_and_deterministic() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0usize, 1, 2, 3, 4, 5];
        let (xa, ya) = NDArrayOperations::shuffle_rows(&x, &y, 1).unwrap();
        let (xb, yb) = NDArrayOperations::shuffle_rows(&x, &y, 1).unwrap();
        assert_eq!(xa, xb);
        assert_eq!(ya, yb);
        for (row, &label) in xa.axis_iter(Axis(0)).zip(ya.iter()) {
            assert_eq!(row[0] as usize, label);
        }
    }

    #[test]
    fn test_softmax_handles_neg_infinity() {
        let logits = array![[0.0, f64::NEG_INFINITY, 0.0]];
        let p = NDArrayOperations::softmax_rows(&logits);
        assert_eq!(p.row(0).to_vec(), vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_logspace_endpoints() {
        let values = NDArrayOperations::logspace(-4.0, -0.5, 50);
        assert_eq!(values.len(), 50);
        assert!((values[0] - 1e-4).abs() < 1e-15);
        assert!((values[49] - 10f64.powf(-0.5)).abs() < 1e-12);
    }
}
