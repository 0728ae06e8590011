//! Matrix configuration
//!
//! The built-in configuration lives in `config/default.toml`. A user file is
//! merged over it key by key, so it only needs the settings it changes.

use crate::error::{MatrixError, MatrixResult};
use crate::registry::{Variant, VariantRegistry};
use crate::stats::ComparisonPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Built-in configuration, also printed as a starting point for user files
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Replaced by the variant name in `variant_args` and variant selectors
pub const VARIANT_PLACEHOLDER: &str = "{variant}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub suite: SuiteConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub comparison: ComparisonPolicy,
    /// Alternative variants in report order; the baseline is implicit
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// How to invoke the benchmark suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Prefix of every artifact and report file name
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Appended for every non-baseline variant without its own selector
    #[serde(default)]
    pub variant_args: Vec<String>,
    /// Directory the suite runs in; inherited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl SuiteConfig {
    /// Arguments passed to `program` when running `variant`
    #[must_use]
    pub fn command_args(&self, variant: &Variant) -> Vec<String> {
        let mut args = self.args.clone();
        if variant.is_baseline() {
            return args;
        }
        let selector = if variant.selector.is_empty() {
            &self.variant_args
        } else {
            &variant.selector
        };
        args.extend(
            selector
                .iter()
                .map(|arg| arg.replace(VARIANT_PLACEHOLDER, &variant.name)),
        );
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub output_root: PathBuf,
    pub timeout_secs: u64,
    /// Variants run at once; timings of concurrent runs interfere
    pub jobs: usize,
    /// Operator subset; empty runs every resolved variant
    #[serde(default)]
    pub variants: Vec<String>,
    pub graph: bool,
    pub json: bool,
}

impl MatrixConfig {
    /// The built-in configuration
    pub fn builtin() -> MatrixResult<Self> {
        Self::from_table(builtin_table()?)
    }

    /// Parse `overlay` and merge it over the built-in configuration
    pub fn from_toml_str(overlay: &str) -> MatrixResult<Self> {
        let mut table = builtin_table()?;
        merge_tables(&mut table, toml::from_str(overlay)?);
        Self::from_table(table)
    }

    /// Load `path` over the built-in configuration; a missing file means
    /// "use the defaults"
    pub fn load(path: &Path) -> MatrixResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Self::from_toml_str(&contents)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No configuration file, using defaults");
                Self::builtin()
            }
            Err(err) => Err(MatrixError::io(path, err)),
        }
    }

    fn from_table(table: toml::Table) -> MatrixResult<Self> {
        let config: Self = table.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> MatrixResult<()> {
        let name = &self.suite.name;
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(MatrixError::config(
                format!("suite name '{name}' is not a valid file name prefix"),
                "set [suite] name to a plain name such as \"bench\"",
            ));
        }
        if self.suite.program.trim().is_empty() {
            return Err(MatrixError::config(
                "suite program is empty",
                "set [suite] program, e.g. \"cargo\"",
            ));
        }
        if self.run.timeout_secs == 0 {
            return Err(MatrixError::config(
                "timeout_secs must be greater than zero",
                "set [run] timeout_secs or pass --timeout with a positive value",
            ));
        }
        if self.run.jobs == 0 {
            return Err(MatrixError::config(
                "jobs must be at least 1",
                "use jobs = 1 for sequential runs",
            ));
        }
        let threshold = self.comparison.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(MatrixError::config(
                format!("threshold {threshold} is not a non-negative number"),
                "use a fraction such as 0.05 for 5%",
            ));
        }
        self.registry().map(|_| ())
    }

    /// Registry built from the declared variants
    pub fn registry(&self) -> MatrixResult<VariantRegistry> {
        VariantRegistry::new(self.variants.clone())
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.run.timeout_secs)
    }
}

fn builtin_table() -> MatrixResult<toml::Table> {
    Ok(toml::from_str(DEFAULT_CONFIG)?)
}

/// Tables merge recursively; any other value in `overlay` replaces the base
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) =
            (base.get_mut(&key), &value)
        {
            merge_tables(existing, incoming.clone());
            continue;
        }
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Estimator;

    #[test]
    fn builtin_config_matches_registry_defaults() {
        let config = MatrixConfig::builtin().unwrap();
        assert_eq!(config.suite.name, "bench");
        assert_eq!(config.run.timeout_secs, 3600);
        assert_eq!(config.run.jobs, 1);
        assert_eq!(config.comparison, ComparisonPolicy::default());
        assert_eq!(config.registry().unwrap(), VariantRegistry::default());
    }

    #[test]
    fn overlay_changes_only_given_keys() {
        let config = MatrixConfig::from_toml_str(
            r#"
            [suite]
            name = "simd-json"

            [comparison]
            estimator = "trimmed-mean"
            "#,
        )
        .unwrap();

        assert_eq!(config.suite.name, "simd-json");
        assert_eq!(config.suite.program, "cargo");
        assert_eq!(config.comparison.estimator, Estimator::TrimmedMean);
        assert!((config.comparison.threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.variants.len(), 5);
    }

    #[test]
    fn overlay_replaces_variant_list() {
        let config = MatrixConfig::from_toml_str(
            r#"
            [[variants]]
            name = "mimalloc"
            selector = ["--features", "alloc-mimalloc"]
            "#,
        )
        .unwrap();
        assert_eq!(config.variants.len(), 1);
        assert_eq!(config.variants[0].selector, ["--features", "alloc-mimalloc"]);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = MatrixConfig::from_toml_str("[run]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, MatrixError::Config { .. }));
    }

    #[test]
    fn declared_baseline_is_rejected() {
        let err = MatrixConfig::from_toml_str("[[variants]]\nname = \"default\"\n").unwrap_err();
        assert!(err.to_string().contains("implicit baseline"));
    }

    #[test]
    fn command_args_follow_variant_kind() {
        let config = MatrixConfig::builtin().unwrap();
        let suite = &config.suite;

        assert_eq!(suite.command_args(&Variant::baseline()), ["bench"]);
        assert_eq!(
            suite.command_args(&Variant::new("mimalloc")),
            ["bench", "--features", "mimalloc"]
        );

        let mut custom = Variant::new("jemalloc");
        custom.selector = vec!["--features=alloc-{variant}".to_string()];
        assert_eq!(suite.command_args(&custom), ["bench", "--features=alloc-jemalloc"]);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MatrixConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, MatrixConfig::builtin().unwrap());
    }
}
