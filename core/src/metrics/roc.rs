//! ROC curves and area under the curve

use crate::error::{BenchError, Result};
use ndarray::{Array2, ArrayView1};

/// False and true positive rates at every distinct score threshold,
/// highest threshold first, starting from `(0, 0)`.
///
/// Returns `None` when the labels hold only one class.
pub fn roc_curve(labels: ArrayView1<f64>, scores: ArrayView1<f64>) -> Option<(Vec<f64>, Vec<f64>)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let positives = labels.iter().filter(|&&l| l > 0.5).count() as f64;
    let negatives = labels.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return None;
    }

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (position, &i) in order.iter().enumerate() {
        if labels[i] > 0.5 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_threshold = order
            .get(position + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_threshold {
            fpr.push(fp / negatives);
            tpr.push(tp / positives);
        }
    }
    Some((fpr, tpr))
}

/// Trapezoidal area under a curve given by monotone `x`
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Binary ROC-AUC; NaN when only one class is present
pub fn roc_auc(labels: ArrayView1<f64>, scores: ArrayView1<f64>) -> f64 {
    match roc_curve(labels, scores) {
        Some((fpr, tpr)) => auc(&fpr, &tpr),
        None => f64::NAN,
    }
}

fn check_shapes(one_hot: &Array2<f64>, proba: &Array2<f64>) -> Result<()> {
    if one_hot.dim() != proba.dim() {
        return Err(BenchError::Shape(format!(
            "one-hot labels are {:?} but probabilities are {:?}",
            one_hot.dim(),
            proba.dim()
        )));
    }
    Ok(())
}

/// Mean one-vs-rest AUC over classes whose AUC is defined; NaN if none is
pub fn roc_auc_macro(one_hot: &Array2<f64>, proba: &Array2<f64>) -> Result<f64> {
    check_shapes(one_hot, proba)?;
    let defined: Vec<f64> = one_hot
        .columns()
        .into_iter()
        .zip(proba.columns())
        .map(|(labels, scores)| roc_auc(labels, scores))
        .filter(|v| !v.is_nan())
        .collect();
    if defined.is_empty() {
        return Ok(f64::NAN);
    }
    Ok(defined.iter().sum::<f64>() / defined.len() as f64)
}

/// AUC of the flattened label and probability matrices
pub fn roc_auc_micro(one_hot: &Array2<f64>, proba: &Array2<f64>) -> Result<f64> {
    check_shapes(one_hot, proba)?;
    let labels: ndarray::Array1<f64> = one_hot.iter().copied().collect();
    let scores: ndarray::Array1<f64> = proba.iter().copied().collect();
    Ok(roc_auc(labels.view(), scores.view()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_and_inverted_rankings() {
        let labels = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(labels.view(), array![0.1, 0.2, 0.8, 0.9].view()), 1.0);
        assert_eq!(roc_auc(labels.view(), array![0.9, 0.8, 0.2, 0.1].view()), 0.0);
    }

    #[test]
    fn test_ties_share_a_threshold() {
        let labels = array![0.0, 1.0, 0.0, 1.0];
        let scores = array![0.5, 0.5, 0.5, 0.5];
        let (fpr, tpr) = roc_curve(labels.view(), scores.view()).unwrap();
        assert_eq!(fpr, vec![0.0, 1.0]);
        assert_eq!(tpr, vec![0.0, 1.0]);
        assert_eq!(roc_auc(labels.view(), scores.view()), 0.5);
    }

    #[test]
    fn test_known_auc_value() {
        // sklearn: roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        assert!((roc_auc(labels.view(), scores.view()) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_macro_skips_undefined_classes() {
        // class 2 never occurs, class 0 is perfectly ranked, class 1 inverted
        let one_hot = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        let proba = array![[0.9, 0.1, 0.0], [0.2, 0.0, 0.8], [0.8, 0.2, 0.0]];
        assert_eq!(roc_auc_macro(&one_hot, &proba).unwrap(), 0.5);
    }

    #[test]
    fn test_single_class_labels_are_nan() {
        let one_hot = array![[1.0], [1.0]];
        let proba = array![[1.0], [1.0]];
        assert!(roc_auc_macro(&one_hot, &proba).unwrap().is_nan());
        assert!(roc_auc_micro(&one_hot, &proba).unwrap().is_nan());
        assert!(roc_auc_micro(&one_hot, &array![[1.0, 0.0]]).is_err());
    }
}
