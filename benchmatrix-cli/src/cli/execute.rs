//! Command execution

use crate::cli::commands::{Cli, Commands};
use crate::config;
use crate::output::{self, ProgressObserver};
use anyhow::{Context, Result};
use benchmatrix_core::{EnvironmentProbe, Matrix, SystemProbe, environment::UNKNOWN};
use std::sync::Arc;
use tracing::warn;

/// Run the parsed command line
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            report,
            timeout,
            jobs,
            environment,
        } => {
            report.apply(&mut config);
            if let Some(timeout) = timeout {
                config.run.timeout_secs = timeout;
            }
            if let Some(jobs) = jobs {
                config.run.jobs = jobs;
            }
            config.validate()?;

            let snapshot = environment.snapshot();
            let observer = Arc::new(ProgressObserver::new());
            let outcome = Matrix::run(&config, &snapshot, observer, interrupted())
                .await
                .context("matrix run aborted")?;
            output::print_outcome(&outcome)?;
        }
        Commands::Compare {
            report,
            environment,
        } => {
            report.apply(&mut config);
            let snapshot = environment.snapshot();
            let spinner = output::spinner("Comparing promoted captures");
            let outcome = Matrix::compare_only(&config, &snapshot);
            spinner.finish_and_clear();
            output::print_outcome(&outcome.context("comparison failed")?)?;
        }
        Commands::Variants { os } => {
            let os = os
                .or_else(|| SystemProbe.os_label())
                .unwrap_or_else(|| UNKNOWN.to_string());
            let variants = config.registry()?.resolve(&os);
            output::print_variants(&config, &os, &variants)?;
        }
        Commands::Env { environment } => {
            output::print_environment(&environment.snapshot())?;
        }
    }

    Ok(())
}

/// Completes on the first ctrl-c; never completes if the handler cannot be
/// installed
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Interrupt received, stopping matrix run"),
        Err(err) => {
            warn!(error = %err, "Unable to listen for interrupts");
            std::future::pending::<()>().await;
        }
    }
}
