//! Per-environment storage of raw captures and reports
//!
//! Layout under `<output_root>/<slug>/`:
//!
//! ```text
//! <suite>.<variant>.raw     promoted capture, one per variant
//! <suite>.result.txt        comparison report
//! <suite>.graph.svg         optional chart
//! <suite>.result.json       optional machine-readable report
//! .scratch-XXXXXX/          captures of the run in progress
//! ```

use crate::capture::RawCapture;
use crate::error::{MatrixError, MatrixResult};
use crate::registry::Variant;
use crate::report::remove_if_exists;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PREVIOUS_SUFFIX: &str = "prev";

/// Captures and reports for one environment slug
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    suite: String,
}

impl ResultStore {
    /// Create (if needed) the directory for `slug` under `output_root`
    pub fn open(output_root: &Path, slug: &str, suite: &str) -> MatrixResult<Self> {
        let dir = output_root.join(slug);
        std::fs::create_dir_all(&dir).map_err(|err| MatrixError::io(&dir, err))?;
        Ok(Self {
            dir,
            suite: suite.to_string(),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn suite(&self) -> &str {
        &self.suite
    }

    #[must_use]
    pub fn artifact_path(&self, variant: &str) -> PathBuf {
        self.dir.join(artifact_file_name(&self.suite, variant))
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}.result.txt", self.suite))
    }

    #[must_use]
    pub fn graph_path(&self) -> PathBuf {
        self.dir.join(format!("{}.graph.svg", self.suite))
    }

    #[must_use]
    pub fn json_path(&self) -> PathBuf {
        self.dir.join(format!("{}.result.json", self.suite))
    }

    /// Remove every report output so a stale one never looks current
    pub fn clear_report(&self) -> MatrixResult<()> {
        for path in [self.report_path(), self.graph_path(), self.json_path()] {
            remove_if_exists(&path)?;
        }
        Ok(())
    }

    /// Fresh scratch directory for one matrix run
    pub fn scratch(&self) -> MatrixResult<ScratchArea> {
        let dir = tempfile::Builder::new()
            .prefix(".scratch-")
            .tempdir_in(&self.dir)
            .map_err(|err| MatrixError::io(&self.dir, err))?;
        tracing::debug!(path = %dir.path().display(), "Scratch area created");
        Ok(ScratchArea {
            dir,
            suite: self.suite.clone(),
        })
    }

    /// Move every listed variant's capture from `scratch` into the store.
    ///
    /// Either all captures are promoted or none are: previous artifacts are
    /// set aside first and put back if any rename fails. Variants not listed
    /// are left untouched.
    pub fn promote(&self, scratch: ScratchArea, variants: &[Variant]) -> MatrixResult<()> {
        for variant in variants {
            let staged = scratch.capture_path(&variant.name);
            if !staged.is_file() {
                return Err(MatrixError::Promotion {
                    dir: self.dir.clone(),
                    reason: format!("no capture for variant '{}' in scratch area", variant.name),
                });
            }
        }

        let mut set_aside: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut promoted: Vec<PathBuf> = Vec::new();
        let result = (|| -> std::io::Result<()> {
            for variant in variants {
                let destination = self.artifact_path(&variant.name);
                if destination.exists() {
                    let aside = scratch
                        .path()
                        .join(format!("{}.{PREVIOUS_SUFFIX}", artifact_file_name(&self.suite, &variant.name)));
                    std::fs::rename(&destination, &aside)?;
                    set_aside.push((aside, destination));
                }
            }
            for variant in variants {
                let destination = self.artifact_path(&variant.name);
                std::fs::rename(scratch.capture_path(&variant.name), &destination)?;
                promoted.push(destination);
            }
            Ok(())
        })();

        if let Err(err) = result {
            for path in &promoted {
                let _ = std::fs::remove_file(path);
            }
            for (aside, destination) in &set_aside {
                if let Err(restore) = std::fs::rename(aside, destination) {
                    tracing::error!(path = %destination.display(), error = %restore, "Failed to restore previous capture");
                }
            }
            return Err(MatrixError::Promotion {
                dir: self.dir.clone(),
                reason: err.to_string(),
            });
        }

        tracing::info!(dir = %self.dir.display(), variants = variants.len(), "Captures promoted");
        Ok(())
    }

    /// Read a promoted capture
    pub fn fetch(&self, variant: &str) -> MatrixResult<RawCapture> {
        let path = self.artifact_path(variant);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(RawCapture::new(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(MatrixError::MissingArtifact {
                    variant: variant.to_string(),
                    path,
                })
            }
            Err(err) => Err(MatrixError::io(path, err)),
        }
    }
}

/// Temporary home of the captures of one run; removed on drop
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
    suite: String,
}

impl ScratchArea {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the runner streams a variant's output
    #[must_use]
    pub fn capture_path(&self, variant: &str) -> PathBuf {
        self.dir.path().join(artifact_file_name(&self.suite, variant))
    }
}

fn artifact_file_name(suite: &str, variant: &str) -> String {
    format!("{suite}.{variant}.raw")
}
