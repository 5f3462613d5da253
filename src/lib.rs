//! CompBench: classifier benchmarking on compositional datasets
//!
//! The binary crate only parses arguments, sets up logging and hands over to
//! [`compbench_core::BenchmarkRunner`].

pub mod cli;
