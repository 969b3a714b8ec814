//! `archifer compile`

use anyhow::{Context, Result};
use archifer_algo::write_lp;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::info;

use super::load_and_compile;

pub fn handle(
    config: &Path,
    table: &Path,
    key_column: Option<&str>,
    lp_out: Option<&Path>,
) -> Result<()> {
    let compiled = load_and_compile(config, table, key_column)?;
    let model = &compiled.model;

    println!(
        "Model {}: {} variables ({} integer), {} constraints, {} soft",
        model.name(),
        model.num_variables(),
        model.num_integer_variables(),
        model.num_constraints(),
        compiled.slacks.len()
    );

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "CONSTRAINT\tMODE\tTERMS\tRHS")?;
    for row in model.constraints() {
        let mode = if compiled.slacks.contains_key(&row.name) {
            "soft"
        } else {
            "hard"
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            row.name,
            mode,
            row.expr.num_terms(),
            row.rhs
        )?;
    }
    writer.flush()?;

    if let Some(path) = lp_out {
        fs::write(path, write_lp(model))
            .with_context(|| format!("writing LP file {}", path.display()))?;
        info!(path = %path.display(), "wrote LP model");
    }
    Ok(())
}
