//! Supervised Learning Training Methods

use super::TrainingInput;
use crate::classifiers::metadata::*;
use crate::classifiers::models::*;
use crate::classifiers::operations::NDArrayOperations;
use crate::classifiers::search::{grid_search, StratifiedKFold};
use crate::error::{BenchError, Result};
use crate::metrics::accuracy;
use ndarray::Axis;
use serde_json::json;
use tracing::info;

type Trained = (Box<dyn TrainedModel>, Hyperparameters);

pub fn train_random_forest(input: TrainingInput<'_>, hyperparameters: &Hyperparameters) -> Result<Trained> {
    info!(
        "Starting Random Forest training with {} samples and {} features",
        input.features.nrows(),
        input.features.ncols()
    );

    let params = RandomForestParams {
        n_estimators: usize_param(hyperparameters, "n_estimators", 200),
        max_depth: optional_usize_param(hyperparameters, "max_depth"),
        min_samples_split: usize_param(hyperparameters, "min_samples_split", 2),
        min_samples_leaf: usize_param(hyperparameters, "min_samples_leaf", 1),
        max_features: optional_usize_param(hyperparameters, "max_features"),
        bootstrap: bool_param(hyperparameters, "bootstrap", true),
        seed: input.seed,
    };
    if params.n_estimators == 0 {
        return Err(BenchError::fit(ClassifierTag::RF, "n_estimators must be positive"));
    }

    let forest = RandomForest::fit(input.features, input.targets, input.n_classes, &params)?;
    info!("Random forest training completed with {} trees", forest.n_trees());

    let resolved = to_hyperparameters(json!({
        "n_estimators": params.n_estimators,
        "max_depth": params.max_depth,
        "min_samples_split": params.min_samples_split,
        "min_samples_leaf": params.min_samples_leaf,
        "max_features": params.max_features,
        "bootstrap": params.bootstrap,
    }));
    Ok((Box::new(forest), resolved))
}

pub fn train_gradient_boosting(input: TrainingInput<'_>, hyperparameters: &Hyperparameters) -> Result<Trained> {
    info!(
        "Starting Gradient Boosting training with {} samples and {} features",
        input.features.nrows(),
        input.features.ncols()
    );

    let params = GradientBoostingParams {
        n_estimators: usize_param(hyperparameters, "n_estimators", 1000),
        learning_rate: f64_param(hyperparameters, "learning_rate", 1.0),
        max_depth: usize_param(hyperparameters, "max_depth", 10),
        min_samples_split: usize_param(hyperparameters, "min_samples_split", 5),
        min_samples_leaf: usize_param(hyperparameters, "min_samples_leaf", 1),
    };
    if params.learning_rate <= 0.0 {
        return Err(BenchError::fit(ClassifierTag::GB, "learning_rate must be positive"));
    }

    let model = GradientBoosting::fit(input.features, input.targets, input.n_classes, &params)?;
    info!("Gradient boosting training completed");

    let resolved = to_hyperparameters(json!({
        "n_estimators": params.n_estimators,
        "learning_rate": params.learning_rate,
        "max_depth": params.max_depth,
        "min_samples_split": params.min_samples_split,
        "min_samples_leaf": params.min_samples_leaf,
    }));
    Ok((Box::new(model), resolved))
}

/// RBF SVM; `C` and `gamma` come from a cross-validated grid unless search is disabled
pub fn train_svm(
    input: TrainingInput<'_>,
    hyperparameters: &Hyperparameters,
    search: &HyperparameterSearchConfig,
) -> Result<Trained> {
    info!(
        "Starting SVM training with {} samples and {} features",
        input.features.nrows(),
        input.features.ncols()
    );

    let c_grid = f64_list_param(hyperparameters, "C_grid", &[1.0, 10.0, 100.0, 1000.0]);
    let gamma_grid = f64_list_param(hyperparameters, "gamma_grid", &[1e-3, 1e-4]);
    let base = SvmParams {
        tol: f64_param(hyperparameters, "tol", 1e-3),
        max_iter: usize_param(hyperparameters, "max_iter", 100_000),
        ..SvmParams::default()
    };

    let (c, gamma) = if search.enabled {
        // grid search is the only search type
        let HyperparameterSearchType::GridSearch = &search.search_type;
        let candidates: Vec<(f64, f64)> = c_grid
            .iter()
            .flat_map(|&c| gamma_grid.iter().map(move |&g| (c, g)))
            .collect();
        let splits = StratifiedKFold::new(search.cross_validation_folds).split(input.targets)?;

        let (best, score) = grid_search(ClassifierTag::SVM, &candidates, input.parallel, |&(c, gamma)| {
            let params = SvmParams {
                c,
                gamma,
                probability: false,
                ..base.clone()
            };
            let mut total = 0.0;
            for (train, test) in &splits {
                let train_x = input.features.select(Axis(0), train);
                let train_y = input.targets.select(Axis(0), train);
                let test_y = input.targets.select(Axis(0), test);
                let model = SupportVectorClassifier::fit(train_x.view(), &train_y, input.n_classes, &params)?;
                let predicted = model.predict(input.features.select(Axis(0), test).view())?;
                total += accuracy(&test_y, &predicted)?;
            }
            Ok(total / splits.len() as f64)
        })?;

        let (c, gamma) = candidates[best];
        info!(
            "SVM grid search selected C={} gamma={} with mean {} {:.4}",
            c, gamma, search.scoring_metric, score
        );
        (c, gamma)
    } else {
        (
            f64_param(hyperparameters, "C", c_grid[0]),
            f64_param(hyperparameters, "gamma", gamma_grid[0]),
        )
    };

    let params = SvmParams {
        c,
        gamma,
        probability: true,
        ..base
    };
    let model = SupportVectorClassifier::fit(input.features, input.targets, input.n_classes, &params)?;
    info!("SVM training completed with {} support vectors", model.n_support());

    let resolved = to_hyperparameters(json!({
        "C": c,
        "gamma": gamma,
        "kernel": "rbf",
        "probability": true,
        "grid_search": search.enabled,
    }));
    Ok((Box::new(model), resolved))
}

/// LR uses the L1 penalty and LR2 the L2 penalty
pub fn train_logistic_regression(
    tag: ClassifierTag,
    input: TrainingInput<'_>,
    hyperparameters: &Hyperparameters,
) -> Result<Trained> {
    info!(
        "Starting {} training with {} samples and {} features",
        tag.model_name(),
        input.features.nrows(),
        input.features.ncols()
    );

    let penalty = match tag {
        ClassifierTag::LR => Penalty::L1,
        _ => Penalty::L2,
    };
    let params = LogisticParams {
        penalty,
        c: f64_param(hyperparameters, "C", 1.0),
        max_iter: usize_param(hyperparameters, "max_iter", 1000),
        tol: f64_param(hyperparameters, "tol", 1e-6),
    };
    if params.c <= 0.0 {
        return Err(BenchError::fit(tag, "C must be positive"));
    }

    let model = LogisticRegression::fit(tag, input.features, input.targets, input.n_classes, &params)?;
    info!("{} training completed", tag.model_name());

    let resolved = to_hyperparameters(json!({
        "penalty": penalty,
        "solver": match penalty {
            Penalty::L1 => "proximal-gradient",
            Penalty::L2 => "lbfgs",
        },
        "C": params.c,
        "max_iter": params.max_iter,
        "tol": params.tol,
    }));
    Ok((Box::new(model), resolved))
}

pub fn train_mlp(input: TrainingInput<'_>, hyperparameters: &Hyperparameters) -> Result<Trained> {
    info!(
        "Starting MLP training with {} samples and {} features",
        input.features.nrows(),
        input.features.ncols()
    );

    let defaults = MlpParams::default();
    let params = MlpParams {
        hidden_layer_sizes: usize_list_param(hyperparameters, "hidden_layer_sizes", &defaults.hidden_layer_sizes),
        alpha: f64_param(hyperparameters, "alpha", defaults.alpha),
        batch_size: usize_param(hyperparameters, "batch_size", defaults.batch_size),
        learning_rate_init: f64_param(hyperparameters, "learning_rate_init", defaults.learning_rate_init),
        max_iter: usize_param(hyperparameters, "max_iter", defaults.max_iter),
        tol: f64_param(hyperparameters, "tol", defaults.tol),
        n_iter_no_change: usize_param(hyperparameters, "n_iter_no_change", defaults.n_iter_no_change),
        seed: input.seed,
        ..defaults
    };
    if params.hidden_layer_sizes.iter().any(|&h| h == 0) {
        return Err(BenchError::fit(ClassifierTag::MLP, "hidden layer sizes must be positive"));
    }

    let model = MlpClassifier::fit(input.features, input.targets, input.n_classes, &params)?;
    info!(
        "MLP training completed after {} epochs with loss {:.6}",
        model.n_iter(),
        model.loss()
    );

    let resolved = to_hyperparameters(json!({
        "hidden_layer_sizes": params.hidden_layer_sizes,
        "activation": "relu",
        "solver": "adam",
        "learning_rate": "adaptive",
        "alpha": params.alpha,
        "batch_size": params.batch_size,
        "learning_rate_init": params.learning_rate_init,
        "max_iter": params.max_iter,
    }));
    Ok((Box::new(model), resolved))
}

pub fn train_naive_bayes(input: TrainingInput<'_>, hyperparameters: &Hyperparameters) -> Result<Trained> {
    info!(
        "Starting Multinomial Naive Bayes training with {} samples and {} features",
        input.features.nrows(),
        input.features.ncols()
    );

    let params = NaiveBayesParams {
        alpha: f64_param(hyperparameters, "alpha", 1.0),
        fit_prior: bool_param(hyperparameters, "fit_prior", true),
    };
    let model = MultinomialNaiveBayes::fit(input.features, input.targets, input.n_classes, &params)?;
    info!("Multinomial naive Bayes training completed");

    let resolved = to_hyperparameters(json!({
        "alpha": params.alpha,
        "fit_prior": params.fit_prior,
    }));
    Ok((Box::new(model), resolved))
}

pub fn train_elastic_net(input: TrainingInput<'_>, hyperparameters: &Hyperparameters) -> Result<Trained> {
    info!(
        "Starting Elastic Net training with {} samples and {} features",
        input.features.nrows(),
        input.features.ncols()
    );

    let defaults = ElasticNetParams::default();
    let alphas = match hyperparameters.get("alphas") {
        Some(_) => f64_list_param(hyperparameters, "alphas", &defaults.alphas),
        None => NDArrayOperations::logspace(
            f64_param(hyperparameters, "alpha_min_exp", -4.0),
            f64_param(hyperparameters, "alpha_max_exp", -0.5),
            usize_param(hyperparameters, "n_alphas", 50),
        ),
    };
    let params = ElasticNetParams {
        alphas,
        l1_ratios: f64_list_param(hyperparameters, "l1_ratio", &defaults.l1_ratios),
        cv_folds: usize_param(hyperparameters, "cv", defaults.cv_folds),
        max_iter: usize_param(hyperparameters, "max_iter", defaults.max_iter),
        tol: f64_param(hyperparameters, "tol", defaults.tol),
        parallel: input.parallel,
    };

    let model = ElasticNetRegressor::fit(input.features, input.targets, input.n_classes, &params)?;
    info!(
        "Elastic net training completed with alpha={:.6} l1_ratio={}",
        model.alpha(),
        model.l1_ratio()
    );

    let resolved = to_hyperparameters(json!({
        "alpha": model.alpha(),
        "l1_ratio": model.l1_ratio(),
        "cv": params.cv_folds,
        "n_alphas": params.alphas.len(),
    }));
    Ok((Box::new(model), resolved))
}

fn f64_param(hyperparameters: &Hyperparameters, key: &str, default: f64) -> f64 {
    hyperparameters
        .get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

fn usize_param(hyperparameters: &Hyperparameters, key: &str, default: usize) -> usize {
    hyperparameters
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn optional_usize_param(hyperparameters: &Hyperparameters, key: &str) -> Option<usize> {
    hyperparameters
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
}

fn bool_param(hyperparameters: &Hyperparameters, key: &str, default: bool) -> bool {
    hyperparameters
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

fn f64_list_param(hyperparameters: &Hyperparameters, key: &str, default: &[f64]) -> Vec<f64> {
    hyperparameters
        .get(key)
        .and_then(|v| match v {
            serde_json::Value::Array(items) => items.iter().map(|i| i.as_f64()).collect(),
            other => other.as_f64().map(|x| vec![x]),
        })
        .filter(|list: &Vec<f64>| !list.is_empty())
        .unwrap_or_else(|| default.to_vec())
}

fn usize_list_param(hyperparameters: &Hyperparameters, key: &str, default: &[usize]) -> Vec<usize> {
    hyperparameters
        .get(key)
        .and_then(|v| v.as_array())
        .and_then(|items| {
            items
                .iter()
                .map(|i| i.as_u64().map(|x| x as usize))
                .collect::<Option<Vec<_>>>()
        })
        .unwrap_or_else(|| default.to_vec())
}

fn to_hyperparameters(value: serde_json::Value) -> Hyperparameters {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => Hyperparameters::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_extraction_falls_back_to_defaults() {
        let mut h = Hyperparameters::new();
        h.insert("n_estimators".to_string(), json!(12));
        h.insert("C_grid".to_string(), json!([0.5, 2]));
        h.insert("gamma_grid".to_string(), json!(0.1));
        h.insert("hidden_layer_sizes".to_string(), json!([4, "x"]));

        assert_eq!(usize_param(&h, "n_estimators", 200), 12);
        assert_eq!(usize_param(&h, "max_depth", 3), 3);
        assert_eq!(optional_usize_param(&h, "max_depth"), None);
        assert_eq!(f64_list_param(&h, "C_grid", &[1.0]), vec![0.5, 2.0]);
        assert_eq!(f64_list_param(&h, "gamma_grid", &[1.0]), vec![0.1]);
        assert_eq!(usize_list_param(&h, "hidden_layer_sizes", &[256, 256]), vec![256, 256]);
    }
}
