//! Benchmark variant matrices: run one suite under several build variants
//! and compare every variant against the baseline.

#![warn(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo
)]
#![deny(clippy::unwrap_in_result, clippy::panic_in_result_fn)]

pub mod capture;
pub mod compare;
pub mod config;
pub mod environment;
pub mod error;
pub mod matrix;
pub mod registry;
pub mod report;
pub mod runner;
pub mod stats;
pub mod store;

pub use capture::{ParsedCapture, RawCapture, SampleSet};
pub use compare::{ComparisonEngine, ComparisonRecord, ComparisonReport, VariantSummary};
pub use config::{MatrixConfig, RunConfig, SuiteConfig};
pub use environment::{EnvironmentOverrides, EnvironmentProbe, EnvironmentSnapshot, SystemProbe};
pub use error::{MatrixError, MatrixResult};
pub use matrix::{Matrix, MatrixOutcome, RunObserver, SilentObserver};
pub use registry::{BASELINE, Variant, VariantRegistry};
pub use report::ReportWriter;
pub use runner::VariantRunner;
pub use stats::{ComparisonPolicy, Estimator, Verdict};
pub use store::{ResultStore, ScratchArea};
