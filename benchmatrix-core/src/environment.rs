//! Host and source-control identity attached to every result set
//!
//! The snapshot is captured once per invocation. Probing never fails the
//! pipeline: anything that cannot be determined becomes [`UNKNOWN`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;

/// Placeholder for any field the probe could not determine
pub const UNKNOWN: &str = "Unknown";

/// Immutable record of the host/build context of one matrix run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    processor_label: String,
    os_label: String,
    logical_core_count: Option<usize>,
    commit_id: String,
    working_tree_clean: Option<bool>,
}

impl EnvironmentSnapshot {
    /// Build a snapshot from already-known values. Blank labels become [`UNKNOWN`].
    #[must_use]
    pub fn new(
        processor_label: impl Into<String>,
        os_label: impl Into<String>,
        logical_core_count: Option<usize>,
        commit_id: impl Into<String>,
        working_tree_clean: Option<bool>,
    ) -> Self {
        Self {
            processor_label: or_unknown(processor_label.into()),
            os_label: or_unknown(os_label.into()),
            logical_core_count,
            commit_id: or_unknown(commit_id.into()),
            working_tree_clean,
        }
    }

    /// Probe the host, then apply operator overrides on top
    #[must_use]
    pub fn capture(probe: &dyn EnvironmentProbe, overrides: &EnvironmentOverrides) -> Self {
        let processor = overrides
            .processor_label
            .clone()
            .or_else(|| probe.processor_label());
        let os = overrides.os_label.clone().or_else(|| probe.os_label());
        let commit = overrides.commit_id.clone().or_else(|| probe.commit_id());
        let clean = match overrides.git_status.as_deref() {
            Some(status) => parse_git_status(status),
            None => probe.working_tree_clean(),
        };

        let snapshot = Self::new(
            processor.unwrap_or_default(),
            os.unwrap_or_default(),
            probe.logical_core_count(),
            commit.unwrap_or_default(),
            clean,
        );
        tracing::debug!(
            processor = %snapshot.processor_label,
            os = %snapshot.os_label,
            commit = %snapshot.commit_id,
            "Captured environment snapshot"
        );
        snapshot
    }

    #[must_use]
    pub fn processor_label(&self) -> &str {
        &self.processor_label
    }

    #[must_use]
    pub fn os_label(&self) -> &str {
        &self.os_label
    }

    #[must_use]
    pub const fn logical_core_count(&self) -> Option<usize> {
        self.logical_core_count
    }

    #[must_use]
    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }

    #[must_use]
    pub const fn working_tree_clean(&self) -> Option<bool> {
        self.working_tree_clean
    }

    /// Human label for the working tree state
    #[must_use]
    pub const fn git_status_label(&self) -> &'static str {
        match self.working_tree_clean {
            Some(true) => "Clean",
            Some(false) => "Uncommitted changes",
            None => UNKNOWN,
        }
    }

    /// Logical core count, or [`UNKNOWN`]
    #[must_use]
    pub fn core_count_label(&self) -> String {
        self.logical_core_count
            .map_or_else(|| UNKNOWN.to_string(), |count| count.to_string())
    }

    /// Filesystem-safe identifier derived from the processor and OS labels.
    ///
    /// Each label keeps only its ASCII alphanumeric characters; the two parts
    /// are joined with `_` so that shifting characters between the labels
    /// cannot produce the same slug.
    #[must_use]
    pub fn slug(&self) -> String {
        format!(
            "{}_{}",
            alphanumeric(&self.processor_label),
            alphanumeric(&self.os_label)
        )
    }
}

impl fmt::Display for EnvironmentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU: {}", self.processor_label)?;
        writeln!(f, "OS: {}", self.os_label)?;
        writeln!(f, "Logical cores: {}", self.core_count_label())?;
        writeln!(f, "Commit: {}", self.commit_id)?;
        write!(f, "Git status: {}", self.git_status_label())
    }
}

/// Operator-pinned values that take precedence over probing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    pub processor_label: Option<String>,
    pub os_label: Option<String>,
    pub commit_id: Option<String>,
    /// `Clean` / `Uncommitted changes` (anything else reads as unknown)
    pub git_status: Option<String>,
}

/// Source of raw host and version-control facts
pub trait EnvironmentProbe {
    fn processor_label(&self) -> Option<String>;

    fn os_label(&self) -> Option<String>;

    fn logical_core_count(&self) -> Option<usize>;

    fn commit_id(&self) -> Option<String>;

    fn working_tree_clean(&self) -> Option<bool>;
}

/// Probe backed by the running host and the `git` executable
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl EnvironmentProbe for SystemProbe {
    fn processor_label(&self) -> Option<String> {
        if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo")
            && let Some(model) = cpuinfo_model_name(&cpuinfo)
        {
            return Some(model);
        }
        command_output("sysctl", &["-n", "machdep.cpu.brand_string"])
            .or_else(|| std::env::var("PROCESSOR_IDENTIFIER").ok())
    }

    fn os_label(&self) -> Option<String> {
        if let Ok(os_release) = std::fs::read_to_string("/etc/os-release")
            && let Some(name) = os_release_pretty_name(&os_release)
        {
            return Some(name);
        }
        if let (Some(name), Some(version)) = (
            command_output("sw_vers", &["-productName"]),
            command_output("sw_vers", &["-productVersion"]),
        ) {
            return Some(format!("{name} {version}"));
        }
        if cfg!(windows) {
            return Some("Windows".to_string());
        }
        command_output("uname", &["-sr"])
    }

    fn logical_core_count(&self) -> Option<usize> {
        Some(num_cpus::get()).filter(|count| *count > 0)
    }

    fn commit_id(&self) -> Option<String> {
        command_output("git", &["rev-parse", "HEAD"])
    }

    fn working_tree_clean(&self) -> Option<bool> {
        let output = Command::new("git")
            .args(["status", "--porcelain"])
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| output.stdout.iter().all(u8::is_ascii_whitespace))
    }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn cpuinfo_model_name(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| matches!(key.trim(), "model name" | "Model" | "Hardware"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn os_release_pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn parse_git_status(status: &str) -> Option<bool> {
    match status.trim().to_lowercase().as_str() {
        "clean" => Some(true),
        "uncommitted changes" | "dirty" => Some(false),
        _ => None,
    }
}

fn alphanumeric(label: &str) -> String {
    label.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn or_unknown(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}
