//! Runs the benchmark suite for one variant and captures its output
//!
//! stdout and stderr are drained concurrently and appended to a single
//! capture in arrival order. Every chunk hits the scratch file as soon as it
//! is read, so a slow run that finished is never lost to a later crash.

use crate::capture::RawCapture;
use crate::config::{MatrixConfig, SuiteConfig};
use crate::error::{MatrixError, MatrixResult};
use crate::registry::Variant;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

const CHUNK_SIZE: usize = 8 * 1024;
const TAIL_LINES: usize = 20;

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Launches the suite once per variant
#[derive(Debug, Clone)]
pub struct VariantRunner {
    suite: SuiteConfig,
    timeout: Duration,
}

impl VariantRunner {
    #[must_use]
    pub const fn new(suite: SuiteConfig, timeout: Duration) -> Self {
        Self { suite, timeout }
    }

    #[must_use]
    pub fn from_config(config: &MatrixConfig) -> Self {
        Self::new(config.suite.clone(), config.timeout())
    }

    /// Run the suite for `variant`, streaming its output into `capture_path`.
    ///
    /// The suite and everything it forked are killed if it outlives the
    /// timeout or if the returned future is dropped.
    pub async fn run(&self, variant: &Variant, capture_path: &Path) -> MatrixResult<RawCapture> {
        let args = self.suite.command_args(variant);
        tracing::info!(
            variant = %variant.name,
            program = %self.suite.program,
            args = ?args,
            "Running benchmark suite"
        );

        let mut command = Command::new(&self.suite.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.suite.working_dir {
            command.current_dir(dir);
        }
        // Own group, so helpers the suite forks can be killed with it
        #[cfg(unix)]
        command.process_group(0);

        let mut sink = File::create(capture_path)
            .await
            .map_err(|err| MatrixError::io(capture_path, err))?;
        let mut child = command.spawn().map_err(|source| MatrixError::Launch {
            variant: variant.name.clone(),
            source,
        })?;
        let mut group = GroupKill::new(&variant.name, child.id());
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(MatrixError::Launch {
                variant: variant.name.clone(),
                source: std::io::Error::other("child output was not piped"),
            });
        };

        let mut buffer = Vec::new();
        let finished = tokio::time::timeout(self.timeout, async {
            drain(stdout, stderr, &mut sink, &mut buffer).await?;
            child.wait().await
        })
        .await;

        let status = match finished {
            Ok(Ok(status)) => {
                group.disarm();
                status
            }
            Ok(Err(err)) => return Err(MatrixError::io(capture_path, err)),
            Err(_) => {
                group.kill();
                if let Err(err) = child.kill().await {
                    tracing::warn!(variant = %variant.name, error = %err, "Failed to kill timed out suite");
                }
                return Err(MatrixError::Timeout {
                    variant: variant.name.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if !status.success() {
            return Err(MatrixError::RunFailed {
                variant: variant.name.clone(),
                status: status.to_string(),
                tail: tail(&buffer),
            });
        }

        tracing::debug!(variant = %variant.name, bytes = buffer.len(), "Suite finished");
        Ok(RawCapture::new(buffer))
    }
}

/// Copy both streams into `sink` and `buffer` until both reach end of file
async fn drain(
    mut stdout: impl AsyncRead + Unpin,
    mut stderr: impl AsyncRead + Unpin,
    sink: &mut File,
    buffer: &mut Vec<u8>,
) -> std::io::Result<()> {
    let mut out_chunk = vec![0_u8; CHUNK_SIZE];
    let mut err_chunk = vec![0_u8; CHUNK_SIZE];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let (stream, read) = tokio::select! {
            read = stdout.read(&mut out_chunk), if out_open => (Stream::Stdout, read?),
            read = stderr.read(&mut err_chunk), if err_open => (Stream::Stderr, read?),
        };
        let chunk = match (stream, read) {
            (Stream::Stdout, 0) => {
                out_open = false;
                continue;
            }
            (Stream::Stderr, 0) => {
                err_open = false;
                continue;
            }
            (Stream::Stdout, n) => &out_chunk[..n],
            (Stream::Stderr, n) => &err_chunk[..n],
        };
        sink.write_all(chunk).await?;
        buffer.extend_from_slice(chunk);
    }

    sink.flush().await?;
    sink.sync_all().await
}

/// Kills every process the suite started unless disarmed.
///
/// `kill_on_drop` only reaches the direct child, while suites like
/// `cargo bench` do their work in grandchildren.
struct GroupKill<'a> {
    variant: &'a str,
    pid: Option<u32>,
}

impl<'a> GroupKill<'a> {
    const fn new(variant: &'a str, pid: Option<u32>) -> Self {
        Self { variant, pid }
    }

    const fn disarm(&mut self) {
        self.pid = None;
    }

    fn kill(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        tracing::debug!(variant = %self.variant, pid, "Killing suite process group");

        #[cfg(unix)]
        let result = std::process::Command::new("kill")
            .args(["-KILL", "--", &format!("-{pid}")])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        #[cfg(windows)]
        let result = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        #[cfg(not(any(unix, windows)))]
        let result: std::io::Result<std::process::ExitStatus> =
            Err(std::io::Error::other("process groups are not supported"));

        if let Err(err) = result {
            tracing::warn!(variant = %self.variant, pid, error = %err, "Failed to kill suite process group");
        }
    }
}

impl Drop for GroupKill<'_> {
    fn drop(&mut self) {
        self.kill();
    }
}

fn tail(output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(TAIL_LINES)..].join("\n")
}
