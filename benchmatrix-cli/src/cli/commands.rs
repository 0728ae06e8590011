//! CLI command definitions

use benchmatrix_core::{EnvironmentOverrides, EnvironmentSnapshot, MatrixConfig, SystemProbe};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run a benchmark suite under every build variant and compare each one
/// against the baseline
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Default log level; `RUST_LOG` takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Configuration file merged over the built-in defaults
    #[arg(short, long, global = true, env = "BENCHMATRIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the suite for every variant, then write the comparison report
    Run {
        #[command(flatten)]
        report: ReportArgs,

        /// Per-variant timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Variants to run at once (timings of concurrent runs interfere)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        environment: EnvironmentArgs,
    },

    /// Rebuild the report from the captures of the last run
    Compare {
        #[command(flatten)]
        report: ReportArgs,

        #[command(flatten)]
        environment: EnvironmentArgs,
    },

    /// Show the variants that would run, in report order
    Variants {
        /// OS label to resolve for instead of the host's
        #[arg(long)]
        os: Option<String>,
    },

    /// Show the environment snapshot and its directory slug
    Env {
        #[command(flatten)]
        environment: EnvironmentArgs,
    },
}

/// Where results go and which outputs to produce
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Root directory for per-environment results
    #[arg(short, long)]
    pub output_root: Option<PathBuf>,

    /// Only these variants (the baseline is always included); repeatable
    #[arg(long = "variant", value_name = "NAME")]
    pub variants: Vec<String>,

    /// Write the SVG chart
    #[arg(long, conflicts_with = "no_graph")]
    pub graph: bool,

    /// Skip the SVG chart
    #[arg(long)]
    pub no_graph: bool,

    /// Also write the JSON report
    #[arg(long)]
    pub json: bool,
}

impl ReportArgs {
    /// Command-line flags win over the configuration file
    pub fn apply(&self, config: &mut MatrixConfig) {
        if let Some(root) = &self.output_root {
            config.run.output_root.clone_from(root);
        }
        if !self.variants.is_empty() {
            config.run.variants.clone_from(&self.variants);
        }
        if self.graph {
            config.run.graph = true;
        }
        if self.no_graph {
            config.run.graph = false;
        }
        if self.json {
            config.run.json = true;
        }
    }
}

/// Values that replace what the host probe would report
#[derive(Args, Debug, Clone, Default)]
pub struct EnvironmentArgs {
    /// Processor label
    #[arg(long)]
    pub cpu: Option<String>,

    /// Operating system label
    #[arg(long)]
    pub os: Option<String>,

    /// Commit identifier
    #[arg(long)]
    pub commit: Option<String>,

    /// Working tree state: "clean" or "uncommitted changes"
    #[arg(long)]
    pub git_status: Option<String>,
}

impl EnvironmentArgs {
    #[must_use]
    pub fn overrides(&self) -> EnvironmentOverrides {
        EnvironmentOverrides {
            processor_label: self.cpu.clone(),
            os_label: self.os.clone(),
            commit_id: self.commit.clone(),
            git_status: self.git_status.clone(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot::capture(&SystemProbe, &self.overrides())
    }
}
