//! CLI argument and configuration wiring tests
//!
//! Parsing tests call `parse_args` directly; exit-code tests run the real
//! binary with temp directories for data and results.

use compbench::cli::{build_config, parse_args, Error, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use compbench_core::{AucPolicy, ClassifierTag};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn argv(extra: &[&str]) -> Vec<String> {
    let mut args: Vec<String> = [
        "compbench",
        "--p1",
        "50",
        "--p2",
        "0.1",
        "--p3",
        "4",
        "--nc",
        "3",
        "--configure",
        "a",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

#[test]
fn test_required_dataset_parameters() {
    let args = parse_args(argv(&[])).unwrap();
    assert_eq!(args.nc, 3);
    assert_eq!(args.dataset_params().postfix(), "50_0.1_4_3_a");
    assert!(!args.parallel);
    assert!(args.classifiers.is_none());

    let missing = parse_args(vec!["compbench".to_string(), "--p1".to_string(), "1".to_string()]);
    assert!(matches!(missing, Err(Error::Usage(_))));
}

#[test]
fn test_optional_flags() {
    let args = parse_args(argv(&[
        "--classifiers",
        "rf,SVM,mb",
        "--auc-policy",
        "probability-only",
        "--parallel",
        "--data-root",
        "/tmp/data",
        "--json-logs",
    ]))
    .unwrap();
    assert_eq!(
        args.classifiers,
        Some(vec![ClassifierTag::RF, ClassifierTag::SVM, ClassifierTag::MB])
    );
    assert_eq!(args.auc_policy, Some(AucPolicy::ProbabilityCapableOnly));
    assert!(args.parallel);
    assert!(args.json_logs);
    assert_eq!(args.data_root, Some(PathBuf::from("/tmp/data")));
}

#[test]
fn test_invalid_values_are_usage_errors() {
    let unknown_tag = parse_args(argv(&["--classifiers", "RF,KNN"]));
    assert!(matches!(unknown_tag, Err(Error::Usage(_))));

    let bad_policy = parse_args(argv(&["--auc-policy", "sometimes"]));
    assert!(matches!(bad_policy, Err(Error::Usage(_))));

    let mut zero_classes = argv(&[]);
    zero_classes[8] = "0".to_string();
    let err = parse_args(zero_classes).unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
    assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
}

#[test]
fn test_flags_override_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.toml");
    fs::write(
        &path,
        r#"
data_root = "/from/file"
results_dir = "/file/results"
folds = [1, 2]
other_classifiers = ["MB"]
"#,
    )
    .unwrap();

    let config_arg = path.to_string_lossy().to_string();
    let args = parse_args(argv(&[
        "--config",
        &config_arg,
        "--results-dir",
        "/flag/results",
        "--classifiers",
        "GB,LR",
    ]))
    .unwrap();
    let config = build_config(&args).unwrap();

    assert_eq!(config.data_root, PathBuf::from("/from/file"));
    assert_eq!(config.results_dir, PathBuf::from("/flag/results"));
    assert_eq!(config.folds, vec![1, 2]);
    assert_eq!(config.probability_classifiers, vec![ClassifierTag::GB]);
    assert_eq!(config.other_classifiers, vec![ClassifierTag::LR]);
}

#[test]
fn test_invalid_config_file_maps_to_config_exit_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.yaml");
    fs::write(&path, "repeats: 0\n").unwrap();

    let config_arg = path.to_string_lossy().to_string();
    let args = parse_args(argv(&["--config", &config_arg])).unwrap();
    let err = build_config(&args).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
}

#[test]
fn test_binary_exit_codes() {
    let binary = env!("CARGO_BIN_EXE_compbench");
    let dir = TempDir::new().unwrap();

    let usage = Command::new(binary).arg("--p1").arg("1").output().unwrap();
    assert_eq!(usage.status.code(), Some(EXIT_CONFIG_ERROR));

    let missing_data = Command::new(binary)
        .args(argv(&[]).iter().skip(1))
        .arg("--data-root")
        .arg(dir.path().join("absent"))
        .arg("--results-dir")
        .arg(dir.path().join("results"))
        .arg("--classifiers")
        .arg("MB")
        .output()
        .unwrap();
    assert_eq!(missing_data.status.code(), Some(EXIT_FAILURE));
    assert!(!dir.path().join("results").join("50_0.1_4_3_a.json").exists());
}
