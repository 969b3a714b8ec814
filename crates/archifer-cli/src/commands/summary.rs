//! `archifer summary`

use anyhow::Result;
use archifer_io::load_sector;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

pub fn handle(
    table: &Path,
    categories: &[String],
    columns: &[String],
    year: Option<u32>,
) -> Result<()> {
    let sector = load_sector(table, year)?;
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    let categories: Vec<&str> = categories.iter().map(String::as_str).collect();
    let breakdowns = sector.breakdown(&columns, &categories)?;

    println!("{}: {} archetypes", sector.name, sector.table().height());
    println!("{sector}");

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "VARIABLE\tCATEGORY\tVALUE\tTOTAL")?;
    for breakdown in &breakdowns {
        for (value, total) in &breakdown.totals {
            writeln!(
                writer,
                "{}\t{}\t{}\t{:.1}",
                breakdown.variable, breakdown.category, value, total
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}
