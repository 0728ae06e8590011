//! Error types for matrix runs
//!
//! Every fatal error names the variant or file involved and carries a
//! suggestion, so the operator can act on the message alone.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while resolving, running or comparing a matrix
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {reason}\n  Suggestion: {suggestion}")]
    Config { reason: String, suggestion: String },

    /// An operator-selected variant is not part of the resolved registry
    #[error(
        "Variant '{name}' is not available on {os}\n  Expected: one of [{available}]\n  Suggestion: check the spelling or drop the variant from the selection"
    )]
    UnknownVariant {
        name: String,
        os: String,
        available: String,
    },

    /// The suite executable could not be started
    #[error("Failed to launch benchmark suite for variant '{variant}': {source}")]
    Launch {
        variant: String,
        #[source]
        source: std::io::Error,
    },

    /// The suite exited with a failure status
    #[error("Benchmark suite failed for variant '{variant}' ({status})\n  Last output:\n{tail}")]
    RunFailed {
        variant: String,
        status: String,
        tail: String,
    },

    /// The suite did not finish within the configured timeout
    #[error(
        "Benchmark suite for variant '{variant}' exceeded the {}s timeout\n  Suggestion: raise run.timeout_secs or pass --timeout",
        .timeout.as_secs()
    )]
    Timeout { variant: String, timeout: Duration },

    /// The operator interrupted the run
    #[error("Matrix run cancelled while running variant '{variant}'")]
    Cancelled { variant: String },

    /// Nothing meaningful can be compared without a readable baseline
    #[error(
        "Baseline capture for variant '{variant}' could not be parsed: {reason}\n  Suggestion: make sure the suite prints Criterion or libtest bench timings"
    )]
    BaselineUnparsable { variant: String, reason: String },

    /// A capture contained no recognisable timing or an unknown unit
    #[error("Capture could not be parsed: {0}")]
    CaptureParse(String),

    /// A promoted artifact expected by a comparison does not exist
    #[error(
        "No promoted capture for variant '{variant}' at {path}\n  Suggestion: run the matrix before comparing"
    )]
    MissingArtifact { variant: String, path: PathBuf },

    /// Moving captures out of the scratch area failed
    #[error("Failed to promote captures into {dir}: {reason}")]
    Promotion { dir: PathBuf, reason: String },

    /// I/O error
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MatrixError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Whether the error came from an operator interrupt rather than a failure
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for matrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_failure_names_variant_and_output() {
        let err = MatrixError::RunFailed {
            variant: "rpmalloc".to_string(),
            status: "exit status: 101".to_string(),
            tail: "error[E0432]: unresolved import `rpmalloc`".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("rpmalloc"));
        assert!(message.contains("exit status: 101"));
        assert!(message.contains("unresolved import"));
    }

    #[test]
    fn timeout_message_reports_seconds() {
        let err = MatrixError::Timeout {
            variant: "smalloc".to_string(),
            timeout: Duration::from_secs(90),
        };
        assert!(err.to_string().contains("90s timeout"));
        assert!(!err.is_cancelled());
    }
}
