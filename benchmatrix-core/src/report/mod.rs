//! Report rendering: text table, JSON and SVG, plus atomic file output

pub mod svg;
pub mod table;

use crate::compare::ComparisonReport;
use crate::error::{MatrixError, MatrixResult};
use crate::stats::Verdict;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use table::TableBuilder;

const TABLE_HEADERS: [&str; 6] = ["case", "variant", "baseline", "estimate", "change", "verdict"];
const NOT_MEASURED_CELL: &str = "-";

/// Render the report as it is written to `<suite>.result.txt`
pub fn render_text(report: &ComparisonReport) -> std::io::Result<String> {
    render(report, false)
}

/// Render the report; `color` only affects table headers
pub fn render(report: &ComparisonReport, color: bool) -> std::io::Result<String> {
    let mut out = Vec::new();
    write_report(&mut out, report, color)?;
    String::from_utf8(out).map_err(std::io::Error::other)
}

/// Write the report straight into `out`
pub fn write_report<W: Write>(out: &mut W, report: &ComparisonReport, color: bool) -> std::io::Result<()> {
    writeln!(out, "Benchmark matrix report: {}", report.suite)?;
    writeln!(out, "{}", report.environment)?;
    writeln!(
        out,
        "Estimator: {} | Threshold: {:.1}% | Dispersion check: {}",
        report.policy.estimator,
        report.policy.threshold * 100.0,
        if report.policy.dispersion_check { "on" } else { "off" }
    )?;
    writeln!(out)?;

    let mut rows = TableBuilder::new(TABLE_HEADERS.iter().map(ToString::to_string).collect())
        .with_color(color);
    for row in &report.rows {
        rows.add_row(vec![
            row.case.clone(),
            row.variant.clone(),
            format_time(row.baseline_estimate_ns),
            row.variant_estimate_ns
                .map_or_else(|| NOT_MEASURED_CELL.to_string(), format_time),
            row.relative_change
                .map_or_else(|| NOT_MEASURED_CELL.to_string(), format_change),
            row.verdict.label().to_string(),
        ]);
    }
    rows.render(out)?;

    writeln!(out)?;
    writeln!(
        out,
        "Summary: time to do 1s of baseline work per case, over {} case(s) measured by every variant",
        report.common_cases
    )?;
    let mut summary = TableBuilder::new(vec![
        "variant".to_string(),
        "total".to_string(),
        "vs baseline".to_string(),
        "improved".to_string(),
        "regressed".to_string(),
        "not measured".to_string(),
    ])
    .with_color(color);
    for (index, entry) in report.summaries.iter().enumerate() {
        let rows_for = |verdict: Verdict| {
            report
                .rows
                .iter()
                .filter(|row| row.variant == entry.variant && row.verdict == verdict)
                .count()
                .to_string()
        };
        summary.add_row(vec![
            entry.variant.clone(),
            format!("{:.1} s", entry.normalized_total),
            if index == 0 {
                "baseline".to_string()
            } else {
                format_change(entry.relative_to_baseline)
            },
            rows_for(Verdict::Improved),
            rows_for(Verdict::Regressed),
            rows_for(Verdict::NotMeasured),
        ]);
    }
    summary.render(out)
}

/// One comparison row read back from a rendered report
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub case: String,
    pub variant: String,
    /// Percentage points, one decimal; `None` when not measured
    pub change_percent: Option<f64>,
    pub verdict: Verdict,
}

/// Read the comparison table back out of a rendered report
pub fn parse_table(text: &str) -> MatrixResult<Vec<ParsedRow>> {
    let (headers, rows) = table::parse_first_table(text)
        .ok_or_else(|| MatrixError::CaptureParse("report contains no table".to_string()))?;
    if headers != TABLE_HEADERS {
        return Err(MatrixError::CaptureParse(format!(
            "unexpected report columns: {}",
            headers.join(", ")
        )));
    }

    rows.into_iter()
        .map(|cells| {
            let [case, variant, _, _, change, verdict] =
                <[String; 6]>::try_from(cells).map_err(|cells| {
                    MatrixError::CaptureParse(format!("malformed report row: {cells:?}"))
                })?;
            let change_percent = if change == NOT_MEASURED_CELL {
                None
            } else {
                Some(
                    change
                        .trim_end_matches('%')
                        .parse::<f64>()
                        .map_err(|err| MatrixError::CaptureParse(format!("bad change '{change}': {err}")))?,
                )
            };
            Ok(ParsedRow {
                case,
                variant,
                change_percent,
                verdict: verdict.parse().map_err(MatrixError::CaptureParse)?,
            })
        })
        .collect()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    report: &'a ComparisonReport,
}

/// Pretty JSON of the full report, stamped with the generation time
pub fn render_json(report: &ComparisonReport) -> MatrixResult<String> {
    Ok(serde_json::to_string_pretty(&JsonReport {
        generated_at: chrono::Utc::now(),
        report,
    })?)
}

/// Human-readable duration with a fixed two decimals
#[must_use]
pub fn format_time(ns: f64) -> String {
    if ns >= 1_000_000_000.0 {
        format!("{:.2} s", ns / 1_000_000_000.0)
    } else if ns >= 1_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.2} µs", ns / 1_000.0)
    } else {
        format!("{ns:.2} ns")
    }
}

fn format_change(ratio: f64) -> String {
    format!("{:+.1}%", ratio * 100.0)
}

/// Writes report files so that a reader never sees a partial one
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Remove `destination`, then write `contents` via a temporary file and rename
    pub fn write(&self, destination: &Path, contents: &str) -> MatrixResult<()> {
        remove_if_exists(destination)?;
        std::fs::create_dir_all(&self.dir).map_err(|err| MatrixError::io(&self.dir, err))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".report-")
            .tempfile_in(&self.dir)
            .map_err(|err| MatrixError::io(&self.dir, err))?;
        temp.write_all(contents.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|err| MatrixError::io(temp.path(), err))?;
        temp.persist(destination)
            .map_err(|err| MatrixError::io(destination, err.error))?;

        tracing::info!(path = %destination.display(), bytes = contents.len(), "Report written");
        Ok(())
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> MatrixResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed previous file");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(MatrixError::io(path, err)),
    }
}
