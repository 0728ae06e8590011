//! End-to-end matrix runs: resolve, run, promote, compare, report

use crate::capture::RawCapture;
use crate::compare::{ComparisonEngine, ComparisonReport};
use crate::config::MatrixConfig;
use crate::environment::EnvironmentSnapshot;
use crate::error::{MatrixError, MatrixResult};
use crate::registry::{Variant, VariantRegistry};
use crate::report::{self, ReportWriter};
use crate::runner::VariantRunner;
use crate::store::{ResultStore, ScratchArea};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Progress notifications from a matrix run.
///
/// With `jobs > 1` notifications arrive from several tasks at once.
pub trait RunObserver: Send + Sync {
    fn matrix_started(&self, _variants: &[Variant]) {}
    fn variant_started(&self, variant: &Variant);
    fn variant_finished(&self, variant: &Variant, elapsed: Duration, capture_bytes: usize);
    fn variant_failed(&self, variant: &Variant, error: &MatrixError);
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {
    fn variant_started(&self, _variant: &Variant) {}
    fn variant_finished(&self, _variant: &Variant, _elapsed: Duration, _capture_bytes: usize) {}
    fn variant_failed(&self, _variant: &Variant, _error: &MatrixError) {}
}

/// What a successful run or comparison produced
#[derive(Debug, Clone)]
pub struct MatrixOutcome {
    pub store_dir: PathBuf,
    pub report_path: PathBuf,
    pub graph_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub variants: Vec<Variant>,
    pub report: ComparisonReport,
}

pub struct Matrix;

impl Matrix {
    /// Run every selected variant, then promote and report.
    ///
    /// Any run failure, or `cancel` completing, aborts the whole matrix:
    /// in-flight suites are killed, nothing is promoted and no report is
    /// left behind.
    pub async fn run<F>(
        config: &MatrixConfig,
        environment: &EnvironmentSnapshot,
        observer: Arc<dyn RunObserver>,
        cancel: F,
    ) -> MatrixResult<MatrixOutcome>
    where
        F: Future<Output = ()>,
    {
        config.validate()?;
        let variants = selected_variants(config, environment)?;
        let store = ResultStore::open(&config.run.output_root, &environment.slug(), &config.suite.name)?;
        store.clear_report()?;
        let scratch = store.scratch()?;

        tracing::info!(
            suite = %config.suite.name,
            dir = %store.dir().display(),
            variants = ?variants.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            jobs = config.run.jobs,
            "Starting matrix run"
        );
        observer.matrix_started(&variants);

        let runner = Arc::new(VariantRunner::from_config(config));
        let cancel = std::pin::pin!(cancel);
        if config.run.jobs > 1 {
            run_concurrently(&runner, &variants, &scratch, &observer, config.run.jobs, cancel).await?;
        } else {
            run_sequentially(&runner, &variants, &scratch, observer.as_ref(), cancel).await?;
        }

        store.promote(scratch, &variants)?;
        write_reports(config, environment, &store, variants)
    }

    /// Rebuild the reports from already promoted captures
    pub fn compare_only(
        config: &MatrixConfig,
        environment: &EnvironmentSnapshot,
    ) -> MatrixResult<MatrixOutcome> {
        config.validate()?;
        let variants = selected_variants(config, environment)?;
        let store = ResultStore::open(&config.run.output_root, &environment.slug(), &config.suite.name)?;
        write_reports(config, environment, &store, variants)
    }
}

fn selected_variants(
    config: &MatrixConfig,
    environment: &EnvironmentSnapshot,
) -> MatrixResult<Vec<Variant>> {
    let os = environment.os_label();
    let resolved = config.registry()?.resolve(os);
    VariantRegistry::select(&resolved, &config.run.variants, os)
}

async fn run_sequentially(
    runner: &VariantRunner,
    variants: &[Variant],
    scratch: &ScratchArea,
    observer: &dyn RunObserver,
    mut cancel: Pin<&mut impl Future<Output = ()>>,
) -> MatrixResult<()> {
    for variant in variants {
        observer.variant_started(variant);
        let started = Instant::now();
        let capture_path = scratch.capture_path(&variant.name);
        let outcome = tokio::select! {
            outcome = runner.run(variant, &capture_path) => outcome,
            () = cancel.as_mut() => Err(MatrixError::Cancelled { variant: variant.name.clone() }),
        };
        settle(observer, variant, started, outcome)?;
    }
    Ok(())
}

async fn run_concurrently(
    runner: &Arc<VariantRunner>,
    variants: &[Variant],
    scratch: &ScratchArea,
    observer: &Arc<dyn RunObserver>,
    jobs: usize,
    mut cancel: Pin<&mut impl Future<Output = ()>>,
) -> MatrixResult<()> {
    let mut queue = variants.iter();
    let mut in_flight: Vec<Variant> = Vec::with_capacity(jobs);
    // Dropping the set aborts the remaining tasks, which kills their suites
    let mut tasks = JoinSet::new();

    loop {
        while tasks.len() < jobs {
            let Some(variant) = queue.next() else {
                break;
            };
            let runner = Arc::clone(runner);
            let observer = Arc::clone(observer);
            let capture_path = scratch.capture_path(&variant.name);
            let variant = variant.clone();
            in_flight.push(variant.clone());
            tasks.spawn(async move {
                observer.variant_started(&variant);
                let started = Instant::now();
                let outcome = runner.run(&variant, &capture_path).await;
                (variant, started, outcome)
            });
        }

        tokio::select! {
            joined = tasks.join_next() => {
                let Some(joined) = joined else {
                    return Ok(());
                };
                let (variant, started, outcome) = match joined {
                    Ok(done) => done,
                    Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Err(_) => return Err(cancelled(observer.as_ref(), &in_flight)),
                };
                in_flight.retain(|running| running.name != variant.name);
                settle(observer.as_ref(), &variant, started, outcome)?;
            }
            () = cancel.as_mut() => return Err(cancelled(observer.as_ref(), &in_flight)),
        }
    }
}

fn cancelled(observer: &dyn RunObserver, in_flight: &[Variant]) -> MatrixError {
    let err = MatrixError::Cancelled {
        variant: in_flight
            .iter()
            .map(|variant| variant.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    };
    for variant in in_flight {
        observer.variant_failed(variant, &err);
    }
    err
}

fn settle(
    observer: &dyn RunObserver,
    variant: &Variant,
    started: Instant,
    outcome: MatrixResult<RawCapture>,
) -> MatrixResult<()> {
    match outcome {
        Ok(capture) => {
            let elapsed = started.elapsed();
            tracing::info!(
                variant = %variant.name,
                elapsed_secs = elapsed.as_secs_f64(),
                bytes = capture.len(),
                "Variant finished"
            );
            observer.variant_finished(variant, elapsed, capture.len());
            Ok(())
        }
        Err(err) => {
            if err.is_cancelled() {
                tracing::warn!(variant = %variant.name, "Variant run cancelled");
            } else {
                tracing::error!(variant = %variant.name, error = %err, "Variant run failed, aborting matrix");
            }
            observer.variant_failed(variant, &err);
            Err(err)
        }
    }
}

fn write_reports(
    config: &MatrixConfig,
    environment: &EnvironmentSnapshot,
    store: &ResultStore,
    variants: Vec<Variant>,
) -> MatrixResult<MatrixOutcome> {
    let mut captures = Vec::with_capacity(variants.len());
    for variant in &variants {
        captures.push((variant.clone(), store.fetch(&variant.name)?));
    }
    let Some(((baseline, baseline_capture), others)) = captures.split_first() else {
        return Err(MatrixError::config(
            "no variants to compare",
            "declare at least the baseline",
        ));
    };

    let report = ComparisonEngine::new(config.comparison).compare(
        &config.suite.name,
        environment,
        (baseline, baseline_capture),
        others,
    )?;

    let report_path = store.report_path();
    let text = report::render_text(&report).map_err(|err| MatrixError::io(&report_path, err))?;
    let mut outputs = vec![(report_path.clone(), text)];
    let graph_path = config.run.graph.then(|| store.graph_path());
    if let Some(path) = &graph_path {
        outputs.push((path.clone(), report::svg::render(&report)));
    }
    let json_path = config.run.json.then(|| store.json_path());
    if let Some(path) = &json_path {
        outputs.push((path.clone(), report::render_json(&report)?));
    }

    if let Err(err) = write_outputs(store, &outputs) {
        discard_reports(store);
        return Err(err);
    }

    tracing::info!(
        path = %report_path.display(),
        improved = report.count(crate::stats::Verdict::Improved),
        regressed = report.count(crate::stats::Verdict::Regressed),
        "Matrix report ready"
    );

    Ok(MatrixOutcome {
        store_dir: store.dir().to_path_buf(),
        report_path,
        graph_path,
        json_path,
        variants,
        report,
    })
}

/// Write every rendered output, removing ones this run does not produce
fn write_outputs(store: &ResultStore, outputs: &[(PathBuf, String)]) -> MatrixResult<()> {
    for stale in [store.graph_path(), store.json_path()] {
        if !outputs.iter().any(|(path, _)| *path == stale) {
            report::remove_if_exists(&stale)?;
        }
    }
    let writer = ReportWriter::new(store.dir());
    for (path, contents) in outputs {
        writer.write(path, contents)?;
    }
    Ok(())
}

/// Leave no partial report set behind after a failed write
fn discard_reports(store: &ResultStore) {
    for path in [store.report_path(), store.graph_path(), store.json_path()] {
        if let Err(err) = report::remove_if_exists(&path) {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove partial report");
        }
    }
}
