//! Locating and loading the configuration file

use anyhow::{Context, Result, bail};
use benchmatrix_core::MatrixConfig;
use std::path::{Path, PathBuf};

/// `<config dir>/benchmatrix/config.toml`, when the platform has a config dir
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("benchmatrix").join("config.toml"))
}

/// Load the explicit file, else the default file if present, else the
/// built-in configuration
pub fn load(explicit: Option<&Path>) -> Result<MatrixConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("configuration file {} does not exist", path.display());
        }
        return MatrixConfig::load(path)
            .with_context(|| format!("invalid config at {}", path.display()));
    }

    match default_config_path() {
        Some(path) => MatrixConfig::load(&path)
            .with_context(|| format!("invalid config at {}", path.display())),
        None => {
            tracing::debug!("No configuration directory on this platform, using defaults");
            Ok(MatrixConfig::builtin()?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\njobs = 2\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.run.jobs, 2);
        assert_eq!(config.run.timeout_secs, 3600);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn invalid_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[run]\njobs = 0\n").unwrap();

        let err = load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("jobs must be at least 1"));
        assert!(err.to_string().contains("config.toml"));
    }
}
