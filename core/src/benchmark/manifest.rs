//! Run manifest written next to the results artifact

use crate::classifiers::{ClassifierTag, FitReport};
use crate::data::DatasetParams;
use crate::error::{BenchError, Result};
use crate::metrics::AucPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dataset: DatasetParams,
    pub folds: Vec<usize>,
    pub repeats: usize,
    pub classifiers: Vec<ClassifierTag>,
    pub auc_policy: AucPolicy,
    pub fit_reports: Vec<FitReport>,
}

impl RunManifest {
    pub fn start(
        dataset: DatasetParams,
        folds: Vec<usize>,
        repeats: usize,
        classifiers: Vec<ClassifierTag>,
        auc_policy: AucPolicy,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dataset,
            folds,
            repeats,
            classifiers,
            auc_policy,
            fit_reports: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Total fitting time over every report
    pub fn total_training_ms(&self) -> u64 {
        self.fit_reports.iter().map(|r| r.training_time_ms).sum()
    }

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
    use crate::classifiers::Hyperparameters;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.manifest.json");
        let dataset = DatasetParams {
            p1: "1".to_string(),
            p2: "2".to_string(),
            p3: "3".to_string(),
            nc: 3,
            configure: "x".to_string(),
        };
        let mut manifest = RunManifest::start(
            dataset,
            vec![1, 2],
            1,
            vec![ClassifierTag::RF, ClassifierTag::MB],
            AucPolicy::default(),
        );
        manifest.fit_reports.push(FitReport {
            tag: ClassifierTag::MB,
            fold: 1,
            repeat: 0,
            training_time_ms: 12,
            training_data_size: 10,
            n_features: 4,
            hyperparameters: Hyperparameters::new(),
            feature_ranking: vec![(2, 0.75), (0, 0.25)],
        });
        manifest.finish();
        manifest.save(&path).unwrap();

        let loaded = RunManifest::load(&path).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert_eq!(loaded.fit_reports.len(), 1);
        assert_eq!(loaded.fit_reports[0].feature_ranking[0], (2, 0.75));
        assert_eq!(loaded.total_training_ms(), 12);
        assert!(loaded.finished_at.is_some());
    }
}
