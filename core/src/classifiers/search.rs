//! Cross-validation splitters and exhaustive grid search

use crate::classifiers::metadata::ClassifierTag;
use crate::error::{BenchError, Result};
use ndarray::Array1;
use rayon::prelude::*;

/// `(train indices, test indices)` for one split
pub type Split = (Vec<usize>, Vec<usize>);

/// Contiguous, unshuffled k-fold splitter
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Split>> {
        check_splits(self.n_splits, n_samples)?;
        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;

        let mut start = 0;
        let mut splits = Vec::with_capacity(self.n_splits);
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            let test: Vec<usize> = (start..start + size).collect();
            let train = (0..start).chain(start + size..n_samples).collect();
            splits.push((train, test));
            start += size;
        }
        Ok(splits)
    }
}

/// Unshuffled k-fold splitter preserving class proportions
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Samples of each class are dealt to folds in contiguous blocks whose
    /// sizes follow a round-robin over the class-sorted labels.
    pub fn split(&self, labels: &Array1<usize>) -> Result<Vec<Split>> {
        let n = labels.len();
        check_splits(self.n_splits, n)?;
        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);

        let mut sorted = labels.to_vec();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; n_classes]; self.n_splits];
        for (position, &class) in sorted.iter().enumerate() {
            allocation[position % self.n_splits][class] += 1;
        }

        let mut test_fold = vec![0usize; n];
        for class in 0..n_classes {
            let members = labels
                .iter()
                .enumerate()
                .filter(|(_, &c)| c == class)
                .map(|(i, _)| i);
            let folds = (0..self.n_splits)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]));
            for (sample, fold) in members.zip(folds) {
                test_fold[sample] = fold;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&i| test_fold[i] == fold);
                (train, test)
            })
            .collect())
    }
}

fn check_splits(n_splits: usize, n_samples: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(BenchError::Config(format!(
            "cross-validation needs at least 2 splits, got {}",
            n_splits
        )));
    }
    if n_splits > n_samples {
        return Err(BenchError::Shape(format!(
            "cannot split {} samples into {} folds",
            n_samples, n_splits
        )));
    }
    Ok(())
}

/// Score every candidate and return the index and score of the best one.
///
/// Higher scores win; ties go to the earlier candidate and non-finite
/// scores never win. A grid with no finite score is a fit error for `tag`.
pub fn grid_search<C, F>(
    tag: ClassifierTag,
    candidates: &[C],
    parallel: bool,
    score: F,
) -> Result<(usize, f64)>
where
    C: Sync,
    F: Fn(&C) -> Result<f64> + Sync,
{
    if candidates.is_empty() {
        return Err(BenchError::Config("empty hyperparameter grid".to_string()));
    }
    let scores: Vec<f64> = if parallel {
        candidates.par_iter().map(&score).collect::<Result<_>>()?
    } else {
        candidates.iter().map(&score).collect::<Result<_>>()?
    };

    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_finite() && best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }
    best.ok_or_else(|| {
        BenchError::fit(
            tag,
            format!("none of the {} grid candidates scored a finite value", candidates.len()),
        )
    })
}
