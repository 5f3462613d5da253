//! Benchmark orchestration
//!
//! Drives the fold loop, fits every configured classifier on each fold and
//! collects the metrics into a [`ResultsMap`](crate::results::ResultsMap).

pub mod manifest;
pub mod orchestrator;

pub use manifest::RunManifest;
pub use orchestrator::{BenchmarkRunner, RunOutcome};
