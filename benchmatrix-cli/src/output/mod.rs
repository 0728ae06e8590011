//! Output formatting utilities for CLI

pub mod progress;

pub use progress::{ProgressObserver, spinner};

use anyhow::Result;
use benchmatrix_core::report::{self, table::TableBuilder};
use benchmatrix_core::{EnvironmentSnapshot, MatrixConfig, MatrixOutcome, Variant};
use std::io::{IsTerminal, Write};

/// Print the report followed by the files that were written
pub fn print_outcome(outcome: &MatrixOutcome) -> Result<()> {
    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    let mut out = stdout.lock();

    report::write_report(&mut out, &outcome.report, color)?;
    writeln!(out)?;
    writeln!(out, "Report: {}", outcome.report_path.display())?;
    if let Some(graph) = &outcome.graph_path {
        writeln!(out, "Graph:  {}", graph.display())?;
    }
    if let Some(json) = &outcome.json_path {
        writeln!(out, "JSON:   {}", json.display())?;
    }
    Ok(())
}

/// Print the resolved variant sequence with the suite command for each
pub fn print_variants(config: &MatrixConfig, os: &str, variants: &[Variant]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "Variants for OS '{os}':")?;
    let mut table = TableBuilder::new(vec!["variant".to_string(), "command".to_string()])
        .with_color(std::io::stdout().is_terminal());
    for variant in variants {
        let mut command = vec![config.suite.program.clone()];
        command.extend(config.suite.command_args(variant));
        let name = if variant.is_baseline() {
            format!("{} (baseline)", variant.name)
        } else {
            variant.name.clone()
        };
        table.add_row(vec![name, command.join(" ")]);
    }
    table.render(&mut out)?;
    Ok(())
}

pub fn print_environment(snapshot: &EnvironmentSnapshot) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{snapshot}")?;
    writeln!(out, "Slug: {}", snapshot.slug())?;
    Ok(())
}
