//! benchmatrix - run a benchmark suite per variant and compare against the baseline

use benchmatrix_cli::cli::{Cli, execute};
use benchmatrix_core::MatrixError;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Conventional exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; --log-level is the fallback directive
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let interrupted = err
                .downcast_ref::<MatrixError>()
                .is_some_and(MatrixError::is_cancelled);
            eprintln!("Error: {err:#}");
            if interrupted {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
