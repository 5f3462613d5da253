//! CLI argument parsing
//!
//! The five dataset parameters are required; everything else overrides the
//! configuration file or the built-in defaults.

use crate::cli::{Error, Result};
use clap::Parser;
use compbench_core::{AucPolicy, ClassifierTag, DatasetParams};
use std::path::PathBuf;

/// Parsed CLI arguments
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(
    name = "compbench",
    version,
    about = "Benchmark classifiers on pre-split compositional datasets"
)]
pub struct Args {
    /// First dataset generation parameter
    #[arg(long)]
    pub p1: String,

    /// Second dataset generation parameter
    #[arg(long)]
    pub p2: String,

    /// Third dataset generation parameter
    #[arg(long)]
    pub p3: String,

    /// Number of classes
    #[arg(long)]
    pub nc: usize,

    /// Dataset configuration label
    #[arg(long)]
    pub configure: String,

    /// Configuration file (TOML, JSON or YAML, picked by extension)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the fold directories
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Directory receiving the results and the run manifest
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Comma-separated classifier tags, e.g. RF,GB,SVM
    #[arg(long, value_delimiter = ',')]
    pub classifiers: Option<Vec<ClassifierTag>>,

    /// AUC policy: require or probability-only
    #[arg(long)]
    pub auc_policy: Option<AucPolicy>,

    /// Fit the classifiers of a fold in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Log filter, e.g. info or compbench_core=debug (defaults to RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn dataset_params(&self) -> DatasetParams {
        DatasetParams {
            p1: self.p1.clone(),
            p2: self.p2.clone(),
            p3: self.p3.clone(),
            nc: self.nc,
            configure: self.configure.clone(),
        }
    }
}

/// Parse CLI arguments, program name first
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let parsed = Args::try_parse_from(args)?;
    if parsed.nc == 0 {
        return Err(Error::InvalidArgs("--nc must be at least 1".to_string()));
    }
    if let Some(classifiers) = &parsed.classifiers {
        if classifiers.is_empty() {
            return Err(Error::InvalidArgs(
                "--classifiers requires at least one tag".to_string(),
            ));
        }
    }
    Ok(parsed)
}
