//! Run dispatch
//!
//! Assembles the configuration from file, environment and flags (in that
//! order of precedence, lowest first), then runs the benchmark.

use crate::cli::{Args, Result, EXIT_SUCCESS};
use compbench_core::{BenchmarkConfig, BenchmarkRunner, ConfigManager};
use tracing::error;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run the benchmark and return the exit code
pub fn run_cli_mode(args: Args) -> ExitCode {
    match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("Benchmark failed: {}", e);
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let runner = BenchmarkRunner::new(config, args.dataset_params())?;
    let outcome = runner.run()?;
    println!("Results written to {}", outcome.results_path.display());
    println!("Run manifest written to {}", outcome.manifest_path.display());
    Ok(())
}

/// Configuration after file, environment and flag overrides
pub fn build_config(args: &Args) -> Result<BenchmarkConfig> {
    let mut manager = match &args.config {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new(),
    };
    manager.apply_env_overrides()?;

    let config = manager.get_config_mut();
    if let Some(data_root) = &args.data_root {
        config.data_root = data_root.clone();
    }
    if let Some(results_dir) = &args.results_dir {
        config.results_dir = results_dir.clone();
    }
    if let Some(classifiers) = &args.classifiers {
        config.set_classifiers(classifiers);
    }
    if let Some(policy) = args.auc_policy {
        config.auc_policy = policy;
    }
    if args.parallel {
        config.parallel = true;
    }

    manager.validate_config()?;
    Ok(manager.into_config())
}
