//! Results map and its on-disk form

use crate::classifiers::ClassifierTag;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// The five metrics recorded for every classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Accuracy,
    F1Macro,
    F1Micro,
    AucMacro,
    AucMicro,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Accuracy,
        Metric::F1Macro,
        Metric::F1Micro,
        Metric::AucMacro,
        Metric::AucMicro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "ACC",
            Metric::F1Macro => "F1 macro",
            Metric::F1Micro => "F1 micro",
            Metric::AucMacro => "AUC macro",
            Metric::AucMicro => "AUC micro",
        }
    }

    pub fn is_auc(&self) -> bool {
        matches!(self, Metric::AucMacro | Metric::AucMicro)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"<TAG>: <metric>"`
pub fn metric_key(tag: ClassifierTag, metric: Metric) -> String {
    format!("{}: {}", tag, metric)
}

/// Values of one metric in processing order.
///
/// NaN is written as `null` and read back as NaN.
#[derive(Debug, Clone, Default)]
pub struct MetricSeries(Vec<f64>);

impl MetricSeries {
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for MetricSeries {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

impl Serialize for MetricSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|v| if v.is_nan() { None } else { Some(*v) }))
    }
}

impl<'de> Deserialize<'de> for MetricSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(MetricSeries(
            values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
        ))
    }
}

/// Mean and population standard deviation of the non-NaN values of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// Mapping from `"<TAG>: <metric>"` to the values recorded so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsMap {
    entries: BTreeMap<String, MetricSeries>,
}

impl ResultsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, creating the key on first use
    pub fn record(&mut self, tag: ClassifierTag, metric: Metric, value: f64) {
        self.entries
            .entry(metric_key(tag, metric))
            .or_default()
            .0
            .push(value);
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.entries.get(key).map(|s| s.values())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.values()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> BTreeMap<String, MetricSummary> {
        self.entries
            .iter()
            .map(|(key, series)| {
                let finite: Vec<f64> = series.0.iter().copied().filter(|v| !v.is_nan()).collect();
                let count = finite.len();
                let (mean, std) = if count == 0 {
                    (f64::NAN, f64::NAN)
                } else {
                    let mean = finite.iter().sum::<f64>() / count as f64;
                    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
                    (mean, var.sqrt())
                };
                (key.clone(), MetricSummary { mean, std, count })
            })
            .collect()
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| BenchError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_creates_keys_and_appends() {
        let mut results = ResultsMap::new();
        results.record(ClassifierTag::RF, Metric::Accuracy, 0.5);
        results.record(ClassifierTag::RF, Metric::Accuracy, 0.75);
        results.record(ClassifierTag::LR2, Metric::AucMicro, 0.9);

        assert_eq!(results.len(), 2);
        assert_eq!(results.get("RF: ACC"), Some(&[0.5, 0.75][..]));
        assert_eq!(results.get("LR2: AUC micro"), Some(&[0.9][..]));
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["LR2: AUC micro", "RF: ACC"]);
    }

    #[test]
    fn test_save_load_round_trip_with_nan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        let mut results = ResultsMap::new();
        results.record(ClassifierTag::GB, Metric::F1Macro, 0.812);
        results.record(ClassifierTag::GB, Metric::AucMacro, f64::NAN);
        results.record(ClassifierTag::GB, Metric::AucMacro, 0.5);
        results.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("null"));

        let loaded = ResultsMap::load(&path).unwrap();
        assert_eq!(loaded, results);
        assert!(loaded.get("GB: AUC macro").unwrap()[0].is_nan());
    }

    #[test]
    fn test_summary_ignores_nan() {
        let mut results = ResultsMap::new();
        for v in [0.5, f64::NAN, 1.0] {
            results.record(ClassifierTag::MB, Metric::Accuracy, v);
        }
        let summary = results.summary();
        let acc = summary["MB: ACC"];
        assert_eq!(acc.count, 2);
        assert_eq!(acc.mean, 0.75);
        assert_eq!(acc.std, 0.25);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = ResultsMap::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BenchError::Io { .. }));
    }
}
