//! CLI module
//!
//! Provides:
//! - Argument parsing (clap derive)
//! - Logging setup
//! - Configuration assembly and run dispatch

pub mod args;
pub mod dispatch;
pub mod logging;

// Re-exports
pub use args::{parse_args, Args};
pub use dispatch::{build_config, run_cli_mode, ExitCode};
pub use logging::init_logging;

use compbench_core::BenchError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error(transparent)]
    Benchmark(#[from] BenchError),
}

impl Error {
    /// Process exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::InvalidArgs(_) | Error::Usage(_) => EXIT_CONFIG_ERROR,
            Error::Benchmark(e) if e.is_config_error() => EXIT_CONFIG_ERROR,
            Error::Benchmark(_) => EXIT_FAILURE,
        }
    }
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
