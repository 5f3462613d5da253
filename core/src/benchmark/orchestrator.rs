use super::manifest::RunManifest;
use crate::classifiers::{
    fit_classifier, ClassifierTag, FitReport, FittedModel, NDArrayOperations, TrainingInput,
};
use crate::config::{self, BenchmarkConfig};
use crate::data::{DataLoader, DatasetParams, FoldData};
use crate::error::{BenchError, Result};
use crate::metrics::{EvaluationData, MetricSet, MetricsEvaluator};
use crate::results::ResultsMap;
use ndarray::Array2;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// One classifier fit within a fold
#[derive(Debug, Clone, Copy)]
struct Job {
    tag: ClassifierTag,
    repeat: usize,
}

struct JobOutput {
    metrics: MetricSet,
    report: FitReport,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: ResultsMap,
    pub manifest: RunManifest,
    pub results_path: PathBuf,
    pub manifest_path: PathBuf,
}

pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    loader: DataLoader,
    evaluator: MetricsEvaluator,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig, params: DatasetParams) -> Result<Self> {
        config::validate(&config)?;
        if params.nc == 0 {
            return Err(BenchError::Config(
                "number of classes must be at least 1".to_string(),
            ));
        }
        let loader = DataLoader::new(&config, params);
        let evaluator = MetricsEvaluator::new(config.auc_policy);
        Ok(Self {
            config,
            loader,
            evaluator,
        })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn params(&self) -> &DatasetParams {
        self.loader.params()
    }

    /// `<results_dir>/<postfix>.json`
    pub fn results_path(&self) -> PathBuf {
        self.config
            .results_dir
            .join(format!("{}.json", self.params().postfix()))
    }

    /// `<results_dir>/<postfix>.manifest.json`
    pub fn manifest_path(&self) -> PathBuf {
        self.config
            .results_dir
            .join(format!("{}.manifest.json", self.params().postfix()))
    }

    /// Run every fold, then write the results and the manifest.
    ///
    /// Nothing is written if any fold fails.
    pub fn run(&self) -> Result<RunOutcome> {
        let mut manifest = RunManifest::start(
            self.params().clone(),
            self.config.folds.clone(),
            self.config.repeats,
            self.config.classifiers(),
            self.config.auc_policy,
        );
        info!(
            "Starting benchmark run {} on {} with {} folds and classifiers {:?}",
            manifest.run_id,
            self.params().postfix(),
            self.config.folds.len(),
            manifest.classifiers
        );

        let mut results = ResultsMap::new();
        for &fold in &self.config.folds {
            let reports = self.run_fold(fold, &mut results)?;
            manifest.fit_reports.extend(reports);
        }
        manifest.finish();

        for (key, summary) in results.summary() {
            info!(
                "{}: mean {:.3}, std {:.3} over {} values",
                key, summary.mean, summary.std, summary.count
            );
        }

        let results_path = self.results_path();
        let manifest_path = self.manifest_path();
        results.save(&results_path)?;
        manifest.save(&manifest_path)?;
        info!(
            "Benchmark run {} finished; results written to {}",
            manifest.run_id,
            results_path.display()
        );

        Ok(RunOutcome {
            results,
            manifest,
            results_path,
            manifest_path,
        })
    }

    /// Fit and score every job of one fold, recording metrics in job order
    pub fn run_fold(&self, fold: usize, results: &mut ResultsMap) -> Result<Vec<FitReport>> {
        let data = self.loader.load_fold(fold)?;
        let one_hot = NDArrayOperations::one_hot_encode(&data.test_labels, self.params().nc)?;
        let features = self.config.selected_features(data.n_features())?;
        info!(
            "Fold {}: {} training and {} test samples, {} of {} features",
            fold,
            data.train_samples.nrows(),
            data.test_samples.nrows(),
            features.len(),
            data.n_features()
        );

        let jobs = self.jobs();
        let outputs: Vec<Result<JobOutput>> = if self.config.parallel {
            jobs.par_iter()
                .map(|job| self.run_job(fold, *job, &data, &one_hot, &features))
                .collect()
        } else {
            jobs.iter()
                .map(|job| self.run_job(fold, *job, &data, &one_hot, &features))
                .collect()
        };

        let mut reports = Vec::with_capacity(outputs.len());
        for output in outputs {
            let output = output?;
            output.metrics.record_into(output.report.tag, results);
            reports.push(output.report);
        }
        Ok(reports)
    }

    /// Probability-capable classifiers once per repeat, then the rest once
    fn jobs(&self) -> Vec<Job> {
        let repeated = (0..self.config.repeats).flat_map(|repeat| {
            self.config
                .probability_classifiers
                .iter()
                .map(move |&tag| Job { tag, repeat })
        });
        let single = self
            .config
            .other_classifiers
            .iter()
            .map(|&tag| Job { tag, repeat: 0 });
        repeated.chain(single).collect()
    }

    fn run_job(
        &self,
        fold: usize,
        job: Job,
        data: &FoldData,
        one_hot: &Array2<f64>,
        features: &[usize],
    ) -> Result<JobOutput> {
        let selected = NDArrayOperations::select_columns(data.train_samples.view(), features)?;
        let input = TrainingInput {
            features: selected.view(),
            targets: &data.train_labels,
            n_classes: self.params().nc,
            seed: job.repeat as u64,
            parallel: self.config.parallel,
        };

        let start = Instant::now();
        let (model, hyperparameters) = fit_classifier(
            job.tag,
            input,
            &self.config.hyperparameters_for(job.tag),
            &self.config.hyperparameter_search,
        )?;
        let training_time_ms = start.elapsed().as_millis() as u64;
        let fitted = FittedModel::new(features.to_vec(), data.n_features(), model);

        let predicted_labels = fitted.predict(data.test_samples.view())?;
        let evaluation = EvaluationData {
            samples: &data.test_samples,
            labels: &data.test_labels,
            one_hot,
        };
        let metrics = self.evaluator.compute(&fitted, &evaluation, &predicted_labels)?;
        debug!(
            "Fold {} {} (repeat {}): ACC {:.3}, F1 macro {:.3}, F1 micro {:.3}, AUC {:?}",
            fold, job.tag, job.repeat, metrics.accuracy, metrics.f1_macro, metrics.f1_micro, metrics.auc
        );

        let report = FitReport {
            tag: job.tag,
            fold,
            repeat: job.repeat,
            training_time_ms,
            training_data_size: selected.nrows(),
            n_features: selected.ncols(),
            hyperparameters,
            feature_ranking: fitted.feature_ranking(),
        };
        info!(
            "Fitted {} on fold {} in {} ms",
            job.tag, fold, report.training_time_ms
        );
        Ok(JobOutput { metrics, report })
    }
}
