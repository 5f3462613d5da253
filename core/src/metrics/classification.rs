//! Label-based classification metrics

use crate::error::{BenchError, Result};
use ndarray::Array1;
use std::collections::BTreeSet;

/// Round to `digits` decimals, ties to even on the exact binary value; NaN stays NaN
pub fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let precision = digits.max(0) as usize;
    format!("{:.*}", precision, value).parse().unwrap_or(value)
}

fn check_lengths(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(BenchError::Shape(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(BenchError::Shape("cannot score an empty label vector".to_string()));
    }
    Ok(())
}

/// Fraction of exact matches
pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Per-label true positive, false positive and false negative counts
/// over the union of true and predicted labels
fn confusion_counts(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Vec<(usize, usize, usize)> {
    let labels: BTreeSet<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels
        .into_iter()
        .map(|label| {
            let mut counts = (0, 0, 0);
            for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                match (t == label, p == label) {
                    (true, true) => counts.0 += 1,
                    (false, true) => counts.1 += 1,
                    (true, false) => counts.2 += 1,
                    (false, false) => {}
                }
            }
            counts
        })
        .collect()
}

/// `2 tp / (2 tp + fp + fn)`, zero when the denominator is zero
fn f1(tp: usize, fp: usize, fn_: usize) -> f64 {
    let denominator = 2 * tp + fp + fn_;
    if denominator == 0 {
        0.0
    } else {
        (2 * tp) as f64 / denominator as f64
    }
}

/// Unweighted mean of per-class F1
pub fn f1_macro(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let counts = confusion_counts(y_true, y_pred);
    let total: f64 = counts.iter().map(|&(tp, fp, fn_)| f1(tp, fp, fn_)).sum();
    Ok(total / counts.len() as f64)
}

/// F1 from counts pooled over all classes
pub fn f1_micro(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let (tp, fp, fn_) = confusion_counts(y_true, y_pred)
        .into_iter()
        .fold((0, 0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));
    Ok(f1(tp, fp, fn_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_round_to_three_decimals() {
        assert_eq!(round_to(0.83349, 3), 0.833);
        assert_eq!(round_to(0.8336, 3), 0.834);
        assert_eq!(round_to(1.0, 3), 1.0);
        assert!(round_to(f64::NAN, 3).is_nan());
    }

    #[test]
    fn test_round_to_breaks_exact_ties_to_even() {
        assert_eq!(round_to(0.8125, 3), 0.812);
        assert_eq!(round_to(0.0625, 3), 0.062);
        assert_eq!(round_to(0.6875, 3), 0.688);

        // 13 of 16 correct is exactly 0.8125
        let y_true = Array1::from(vec![0usize; 16]);
        let mut y_pred = y_true.clone();
        y_pred[0] = 1;
        y_pred[1] = 1;
        y_pred[2] = 1;
        assert_eq!(round_to(accuracy(&y_true, &y_pred).unwrap(), 3), 0.812);
    }

    #[test]
    fn test_all_zero_labels_score_perfectly() {
        let y = array![0usize, 0, 0, 0];
        assert_eq!(accuracy(&y, &y).unwrap(), 1.0);
        assert_eq!(f1_macro(&y, &y).unwrap(), 1.0);
        assert_eq!(f1_micro(&y, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_f1_against_hand_computation() {
        let y_true = array![0usize, 0, 1, 1, 2, 2];
        let y_pred = array![0usize, 1, 1, 1, 2, 0];
        // class 0: tp 1 fp 1 fn 1 -> 0.5; class 1: tp 2 fp 1 fn 0 -> 0.8; class 2: tp 1 fn 1 -> 2/3
        let expected = (0.5 + 0.8 + 2.0 / 3.0) / 3.0;
        assert!((f1_macro(&y_true, &y_pred).unwrap() - expected).abs() < 1e-12);
        assert!((f1_micro(&y_true, &y_pred).unwrap() - 4.0 / 6.0).abs() < 1e-12);
        assert!((accuracy(&y_true, &y_pred).unwrap() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        assert!(accuracy(&array![0usize, 1], &array![0usize]).is_err());
        assert!(f1_macro(&array![], &array![]).is_err());
    }
}
