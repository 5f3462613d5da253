//! Fold data loading
//!
//! Reads the tab-separated sample and label files of every fold, checks
//! their shapes and labels, and row-normalizes the samples.

pub mod loader;
pub mod tsv;

pub use loader::{DataLoader, DatasetParams, FileKind, FoldData};
