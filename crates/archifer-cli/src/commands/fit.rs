//! `archifer fit`

use anyhow::{Context, Result};
use archifer_algo::{ArchetypeCount, ConstraintResidual, LpSolverKind, SlackValue};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::{info, warn};

use super::load_and_compile;

/// Fit output format (JSON)
#[derive(Debug, Serialize)]
struct FitOutput {
    status: String,
    solver: String,
    objective: f64,
    counts: Vec<ArchetypeCount>,
    slacks: Vec<SlackValue>,
    residuals: Vec<ConstraintResidual>,
    solve_time_ms: u64,
}

pub fn handle(
    config: &Path,
    table: &Path,
    key_column: Option<&str>,
    solver: &str,
    out: Option<&Path>,
) -> Result<()> {
    let kind: LpSolverKind = solver.parse()?;
    let compiled = load_and_compile(config, table, key_column)?;
    let solution = compiled
        .solve(kind)
        .with_context(|| format!("solving with {kind}"))?;

    let output = FitOutput {
        status: solution.status_message().to_string(),
        solver: kind.to_string(),
        objective: solution.objective,
        counts: compiled.archetype_counts(&solution),
        slacks: compiled.slack_values(&solution),
        residuals: compiled.constraint_residuals(&solution),
        solve_time_ms: solution.solve_time.as_millis() as u64,
    };

    println!("Status: {}", output.status);
    println!("Objective: {:.4}", output.objective);
    if !solution.violations.is_empty() {
        warn!(
            violated = solution.violations.len(),
            "rounded counts do not satisfy all hard constraints"
        );
    }

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "ARCHETYPE\tCOUNT")?;
    for count in &output.counts {
        writeln!(writer, "{}\t{}", count.key, count.count)?;
    }
    if !output.slacks.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "CONSTRAINT\tDEVIATION")?;
        for slack in &output.slacks {
            writeln!(writer, "{}\t{:.4}", slack.name, slack.deviation())?;
        }
    }
    let broken: Vec<&ConstraintResidual> = output
        .residuals
        .iter()
        .filter(|r| r.hard && r.residual.abs() > archifer_algo::RESIDUAL_TOLERANCE)
        .collect();
    if !broken.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "HARD CONSTRAINT\tRESIDUAL")?;
        for row in broken {
            writeln!(writer, "{}\t{:.4}", row.name, row.residual)?;
        }
    }
    writer.flush()?;

    if let Some(path) = out {
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &output).context("writing fit output")?;
        writer.flush()?;
        info!(path = %path.display(), "wrote fit results");
    }
    Ok(())
}
