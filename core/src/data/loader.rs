//! Per-fold dataset loading

use super::tsv::{read_labels, read_matrix};
use crate::classifiers::NDArrayOperations;
use crate::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// The five parameters naming a generated dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetParams {
    pub p1: String,
    pub p2: String,
    pub p3: String,
    /// Number of classes
    pub nc: usize,
    pub configure: String,
}

impl DatasetParams {
    /// `<p1>_<p2>_<p3>_<nc>_<configure>`, shared by input and output file names
    pub fn postfix(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.p1, self.p2, self.p3, self.nc, self.configure
        )
    }
}

/// The four files of a fold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    TrainSample,
    TrainLabel,
    TestSample,
    TestLabel,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::TrainSample => "TrainSample",
            FileKind::TrainLabel => "TrainLabel",
            FileKind::TestSample => "TestSample",
            FileKind::TestLabel => "TestLabel",
        })
    }
}

/// Normalized samples and labels of one fold
#[derive(Debug, Clone)]
pub struct FoldData {
    pub train_samples: Array2<f64>,
    pub train_labels: Array1<usize>,
    pub test_samples: Array2<f64>,
    pub test_labels: Array1<usize>,
}

impl FoldData {
    pub fn n_features(&self) -> usize {
        self.train_samples.ncols()
    }
}

pub struct DataLoader {
    data_root: PathBuf,
    dataset_name: String,
    fold_dir_prefix: String,
    shuffle_seed: u64,
    params: DatasetParams,
}

impl DataLoader {
    pub fn new(config: &BenchmarkConfig, params: DatasetParams) -> Self {
        Self {
            data_root: config.data_root.clone(),
            dataset_name: config.dataset_name.clone(),
            fold_dir_prefix: config.fold_dir_prefix.clone(),
            shuffle_seed: config.shuffle_seed,
            params,
        }
    }

    pub fn params(&self) -> &DatasetParams {
        &self.params
    }

    /// `<data_root>/<prefix><fold>/<Kind><dataset>_<fold>_<postfix>.txt`
    pub fn file_path(&self, fold: usize, kind: FileKind) -> PathBuf {
        self.data_root
            .join(format!("{}{}", self.fold_dir_prefix, fold))
            .join(format!(
                "{}{}_{}_{}.txt",
                kind,
                self.dataset_name,
                fold,
                self.params.postfix()
            ))
    }

    /// Load, normalize and shuffle the training half of a fold
    pub fn load_fold(&self, fold: usize) -> Result<FoldData> {
        let nc = self.params.nc;
        let train_samples = read_matrix(&self.file_path(fold, FileKind::TrainSample))?;
        let train_labels = read_labels(&self.file_path(fold, FileKind::TrainLabel), nc)?;
        let test_samples = read_matrix(&self.file_path(fold, FileKind::TestSample))?;
        let test_labels = read_labels(&self.file_path(fold, FileKind::TestLabel), nc)?;

        if train_samples.nrows() != train_labels.len() {
            return Err(BenchError::Shape(format!(
                "fold {}: {} training samples but {} training labels",
                fold,
                train_samples.nrows(),
                train_labels.len()
            )));
        }
        if test_samples.nrows() != test_labels.len() {
            return Err(BenchError::Shape(format!(
                "fold {}: {} test samples but {} test labels",
                fold,
                test_samples.nrows(),
                test_labels.len()
            )));
        }
        if train_samples.ncols() != test_samples.ncols() {
            return Err(BenchError::Shape(format!(
                "fold {}: training data has {} features, test data has {}",
                fold,
                train_samples.ncols(),
                test_samples.ncols()
            )));
        }

        let train_samples = NDArrayOperations::row_normalize(&train_samples);
        let test_samples = NDArrayOperations::row_normalize(&test_samples);
        let (train_samples, train_labels) =
            NDArrayOperations::shuffle_rows(&train_samples, &train_labels, self.shuffle_seed)?;

        debug!(
            "Loaded fold {}: {} train and {} test samples, {} features",
            fold,
            train_samples.nrows(),
            test_samples.nrows(),
            train_samples.ncols()
        );

        Ok(FoldData {
            train_samples,
            train_labels,
            test_samples,
            test_labels,
        })
    }
}
