use anyhow::{anyhow, Context, Result};
use archifer_core::{ArchetypeTable, BuildingSector, FLOOR_AREA_COLUMN};
use calamine::{open_workbook_auto, Data, Range, Reader};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Floor-area header used by the source building statistics.
pub const SOURCE_FLOOR_AREA_HEADER: &str = "Nettogrundfläche in Quadratmetern";

/// Workbook with the Austrian building stock, relative to the working directory.
pub const DEFAULT_SECTOR_TABLE: &str = "data/gebaeudesektor_at.xlsx";

/// Read a CSV, Excel or Parquet file into a DataFrame based on its extension.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            let reader = ParquetReader::new(&mut file);
            reader.finish().context("reading Parquet file")
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => {
            let reader = CsvReader::new(&mut file);
            reader.has_header(true).finish().context("reading CSV file")
        }
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path),
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv, .xlsx or .parquet",
            extension
        )),
    }
}

/// First worksheet of a workbook; the first row holds the column names.
fn read_workbook(path: &Path) -> Result<DataFrame> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", path.display()))?
        .context("reading first worksheet")?;
    frame_from_range(&range)
}

fn frame_from_range(range: &Range<Data>) -> Result<DataFrame> {
    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| anyhow!("worksheet is empty"))?;
    let body: Vec<&[Data]> = rows.collect();

    let columns: Vec<Series> = header
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let name = match name {
                Data::Empty => format!("column_{col}"),
                other => other.to_string(),
            };
            let cells: Vec<Option<&Data>> = body
                .iter()
                .map(|row| row.get(col).filter(|c| !matches!(c, Data::Empty)))
                .collect();
            sheet_column(&name, &cells)
        })
        .collect();
    DataFrame::new(columns).context("building frame from worksheet")
}

/// Numeric and boolean columns keep their type, anything mixed becomes text.
fn sheet_column(name: &str, cells: &[Option<&Data>]) -> Series {
    let filled = || cells.iter().flatten();
    if filled().all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Some(Data::Int(v)) => Some(*v as f64),
                Some(Data::Float(v)) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else if filled().all(|c| matches!(c, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Some(Data::Bool(b)) => Some(*b),
                _ => None,
            })
            .collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| cell.map(|c| c.to_string()))
            .collect();
        Series::new(name, values)
    }
}

/// Load an archetype table and rename the source floor-area header to
/// `NGF`. With `key_column`, archetype keys come from that column instead
/// of the row position.
pub fn load_archetypes(path: &Path, key_column: Option<&str>) -> Result<ArchetypeTable> {
    let frame = read_frame(path)?;
    let mut table = ArchetypeTable::new(frame);
    if table.rename_column(SOURCE_FLOOR_AREA_HEADER, FLOOR_AREA_COLUMN)? {
        debug!(from = SOURCE_FLOOR_AREA_HEADER, to = FLOOR_AREA_COLUMN, "renamed column");
    }
    if let Some(column) = key_column {
        table = table
            .with_key_column(column)
            .with_context(|| format!("selecting key column in {}", path.display()))?;
    }
    info!(
        path = %path.display(),
        archetypes = table.height(),
        columns = table.column_names().len(),
        "loaded archetype table"
    );
    Ok(table)
}

/// Load an archetype table as a [`BuildingSector`] for `year`
/// (default 2025), usually from [`DEFAULT_SECTOR_TABLE`].
pub fn load_sector(path: &Path, year: Option<u32>) -> Result<BuildingSector> {
    let table = load_archetypes(path, None)?;
    Ok(BuildingSector::new(table, year))
}
