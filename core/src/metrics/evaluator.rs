//! Scoring a fitted model on a test fold

use super::classification::{accuracy, f1_macro, f1_micro, round_to};
use super::roc::{roc_auc_macro, roc_auc_micro};
use crate::classifiers::{ClassifierTag, FittedModel};
use crate::error::{BenchError, Result};
use crate::results::{Metric, ResultsMap};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Which classifiers get AUC metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AucPolicy {
    /// Every classifier; one without probabilities fails the run
    #[default]
    #[serde(rename = "require")]
    RequireProbabilities,
    /// Only the probability-capable tags; the rest report AUC as not applicable
    #[serde(rename = "probability-only")]
    ProbabilityCapableOnly,
}

impl AucPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AucPolicy::RequireProbabilities => "require",
            AucPolicy::ProbabilityCapableOnly => "probability-only",
        }
    }

    pub fn applies_to(&self, tag: ClassifierTag) -> bool {
        match self {
            AucPolicy::RequireProbabilities => true,
            AucPolicy::ProbabilityCapableOnly => tag.is_probability_capable(),
        }
    }
}

impl fmt::Display for AucPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AucPolicy {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "require" | "require-probabilities" => Ok(AucPolicy::RequireProbabilities),
            "probability-only" | "probability-capable-only" => Ok(AucPolicy::ProbabilityCapableOnly),
            other => Err(BenchError::Config(format!(
                "unknown AUC policy '{}', expected 'require' or 'probability-only'",
                other
            ))),
        }
    }
}

/// Rounded metric values of one (fold, classifier) evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSet {
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_micro: f64,
    /// `None` when AUC does not apply under the policy
    pub auc: Option<(f64, f64)>,
}

impl MetricSet {
    pub fn values(&self) -> Vec<(Metric, f64)> {
        let mut values = vec![
            (Metric::Accuracy, self.accuracy),
            (Metric::F1Macro, self.f1_macro),
            (Metric::F1Micro, self.f1_micro),
        ];
        if let Some((macro_auc, micro_auc)) = self.auc {
            values.push((Metric::AucMacro, macro_auc));
            values.push((Metric::AucMicro, micro_auc));
        }
        values
    }

    pub fn record_into(&self, tag: ClassifierTag, results: &mut ResultsMap) {
        for (metric, value) in self.values() {
            results.record(tag, metric, value);
        }
    }
}

/// Test fold inputs shared by every classifier in a fold
pub struct EvaluationData<'a> {
    pub samples: &'a Array2<f64>,
    pub labels: &'a Array1<usize>,
    pub one_hot: &'a Array2<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEvaluator {
    policy: AucPolicy,
}

impl MetricsEvaluator {
    pub fn new(policy: AucPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AucPolicy {
        self.policy
    }

    /// Compute every applicable metric without touching a results map
    pub fn compute(
        &self,
        model: &FittedModel,
        data: &EvaluationData<'_>,
        predicted_labels: &Array1<usize>,
    ) -> Result<MetricSet> {
        let tag = model.tag();
        let own_predictions = model.predict(data.samples.view())?;

        let accuracy = round_to(accuracy(data.labels, &own_predictions)?, 3);
        let f1_macro = round_to(f1_macro(data.labels, predicted_labels)?, 3);
        let f1_micro = round_to(f1_micro(data.labels, predicted_labels)?, 3);

        let auc = if self.policy.applies_to(tag) {
            let proba = model.predict_proba(data.samples.view())?;
            Some((
                round_to(roc_auc_macro(data.one_hot, &proba)?, 3),
                round_to(roc_auc_micro(data.one_hot, &proba)?, 3),
            ))
        } else {
            info!("{}: AUC not applicable under the '{}' policy", tag, self.policy);
            None
        };

        Ok(MetricSet {
            accuracy,
            f1_macro,
            f1_micro,
            auc,
        })
    }

    /// Compute the metrics and append them to `results`
    pub fn evaluate(
        &self,
        model: &FittedModel,
        data: &EvaluationData<'_>,
        predicted_labels: &Array1<usize>,
        results: &mut ResultsMap,
    ) -> Result<MetricSet> {
        let metrics = self.compute(model, data, predicted_labels)?;
        metrics.record_into(model.tag(), results);
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::models::TrainedModel;
    use ndarray::array;

    /// Always predicts class 0 with certainty
    struct ConstantModel {
        tag: ClassifierTag,
        n_classes: usize,
        proba: bool,
    }

    impl TrainedModel for ConstantModel {
        fn tag(&self) -> ClassifierTag {
            self.tag
        }

        fn n_classes(&self) -> usize {
            self.n_classes
        }

        fn predict(&self, x: ndarray::ArrayView2<f64>) -> Result<Array1<usize>> {
            Ok(Array1::zeros(x.nrows()))
        }

        fn supports_proba(&self) -> bool {
            self.proba
        }

        fn predict_proba(&self, x: ndarray::ArrayView2<f64>) -> Result<Array2<f64>> {
            if !self.proba {
                return Err(BenchError::ProbabilitiesUnavailable {
                    tag: self.tag.to_string(),
                });
            }
            let mut p = Array2::zeros((x.nrows(), self.n_classes));
            p.column_mut(0).fill(1.0);
            Ok(p)
        }
    }

    fn constant(tag: ClassifierTag, n_classes: usize, proba: bool) -> FittedModel {
        FittedModel::new(
            vec![0, 1],
            2,
            Box::new(ConstantModel {
                tag,
                n_classes,
                proba,
            }),
        )
    }

    #[test]
    fn test_all_class_zero_scenario() {
        let samples = array![[0.5, 0.5], [0.2, 0.8], [0.9, 0.1]];
        let labels = array![0usize, 0, 0];
        let one_hot = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let data = EvaluationData {
            samples: &samples,
            labels: &labels,
            one_hot: &one_hot,
        };
        let model = constant(ClassifierTag::RF, 2, true);
        let mut results = ResultsMap::new();
        let metrics = MetricsEvaluator::default()
            .evaluate(&model, &data, &labels, &mut results)
            .unwrap();

        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.f1_macro, 1.0);
        assert_eq!(metrics.f1_micro, 1.0);
        let (macro_auc, micro_auc) = metrics.auc.unwrap();
        assert!(macro_auc.is_nan());
        // flattened labels hold both values, scores rank them perfectly
        assert_eq!(micro_auc, 1.0);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_policy_controls_auc_for_non_probability_models() {
        let samples = array![[0.5, 0.5], [0.2, 0.8]];
        let labels = array![0usize, 1];
        let one_hot = array![[1.0, 0.0], [0.0, 1.0]];
        let data = EvaluationData {
            samples: &samples,
            labels: &labels,
            one_hot: &one_hot,
        };
        let model = constant(ClassifierTag::ENET, 2, false);
        let predicted = array![0usize, 0];

        let err = MetricsEvaluator::new(AucPolicy::RequireProbabilities)
            .compute(&model, &data, &predicted)
            .unwrap_err();
        assert!(matches!(err, BenchError::ProbabilitiesUnavailable { .. }));

        let mut results = ResultsMap::new();
        let metrics = MetricsEvaluator::new(AucPolicy::ProbabilityCapableOnly)
            .evaluate(&model, &data, &predicted, &mut results)
            .unwrap();
        assert_eq!(metrics.auc, None);
        assert_eq!(metrics.accuracy, 0.5);
        assert_eq!(results.len(), 3);
        assert!(results.get("ENET: AUC macro").is_none());
    }

    #[test]
    fn test_auc_policy_parsing() {
        assert_eq!("require".parse::<AucPolicy>().unwrap(), AucPolicy::RequireProbabilities);
        assert_eq!(
            "Probability-Only".parse::<AucPolicy>().unwrap(),
            AucPolicy::ProbabilityCapableOnly
        );
        assert!("sometimes".parse::<AucPolicy>().is_err());
        assert_eq!(
            serde_json::to_string(&AucPolicy::ProbabilityCapableOnly).unwrap(),
            r#""probability-only""#
        );
    }
}
