//! Classification metrics
//!
//! Accuracy, macro and micro F1, one-vs-rest ROC-AUC, and the evaluator that
//! records them into a [`ResultsMap`](crate::results::ResultsMap).

pub mod classification;
pub mod evaluator;
pub mod roc;

pub use classification::{accuracy, f1_macro, f1_micro, round_to};
pub use evaluator::{AucPolicy, EvaluationData, MetricSet, MetricsEvaluator};
pub use roc::{auc, roc_auc, roc_auc_macro, roc_auc_micro, roc_curve};
