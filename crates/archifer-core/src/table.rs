//! Archetype table
//!
//! Thin wrapper around a polars [`DataFrame`] holding one building
//! archetype per row. The compiler only needs a few things from it: the
//! archetype keys, numeric columns as `f64`, aggregate sums and row
//! filtering.

use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};

use crate::error::{ArchiferError, ArchiferResult};
use crate::filter::RowFilter;

/// Cells of one column, materialized for row-wise evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Number(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ColumnValues::Number(_) => "numeric",
            ColumnValues::Text(_) => "text",
            ColumnValues::Bool(_) => "boolean",
        }
    }

    /// Cell rendered as a group label; `None` for missing cells.
    fn label(&self, row: usize) -> Option<String> {
        match self {
            ColumnValues::Number(v) => v[row].map(|x| x.to_string()),
            ColumnValues::Text(v) => v[row].clone(),
            ColumnValues::Bool(v) => v[row].map(|b| b.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchetypeTable {
    frame: DataFrame,
    key_column: Option<String>,
}

impl ArchetypeTable {
    /// Wrap a frame; archetypes are keyed by row position.
    pub fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            key_column: None,
        }
    }

    /// Key archetypes by the values of `column` instead of row position.
    /// The resulting keys must be unique.
    pub fn with_key_column(mut self, column: &str) -> ArchiferResult<Self> {
        if !self.has_column(column) {
            return Err(ArchiferError::missing("column", column));
        }
        self.key_column = Some(column.to_string());
        self.keys()?;
        Ok(self)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn key_column(&self) -> Option<&str> {
        self.key_column.as_deref()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_names().iter().any(|c| *c == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    /// Archetype keys in row order. Rows with an empty key fall back to
    /// their position; a key that appears twice is a table error.
    pub fn keys(&self) -> ArchiferResult<Vec<String>> {
        let Some(column) = &self.key_column else {
            return Ok((0..self.height()).map(|i| i.to_string()).collect());
        };
        let series = self.series(column)?.cast(&DataType::Utf8)?;
        let keys: Vec<String> = series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(i, key)| key.map_or_else(|| i.to_string(), str::to_string))
            .collect();

        let mut seen = HashSet::with_capacity(keys.len());
        for (row, key) in keys.iter().enumerate() {
            if !seen.insert(key.as_str()) {
                return Err(ArchiferError::Table(format!(
                    "duplicate archetype key '{key}' in column '{column}' (row {row})"
                )));
            }
        }
        Ok(keys)
    }

    /// Materialize a column for row-wise evaluation.
    pub fn column_values(&self, name: &str) -> ArchiferResult<ColumnValues> {
        let series = self.series(name)?;
        let values = match series.dtype() {
            DataType::Boolean => ColumnValues::Bool(series.bool()?.into_iter().collect()),
            dtype if dtype.is_numeric() => {
                let cast = series.cast(&DataType::Float64)?;
                let cells = cast.f64()?.into_iter().collect();
                ColumnValues::Number(cells)
            }
            _ => {
                let cast = series.cast(&DataType::Utf8)?;
                let cells = cast
                    .utf8()?
                    .into_iter()
                    .map(|cell| cell.map(str::to_string))
                    .collect();
                ColumnValues::Text(cells)
            }
        };
        Ok(values)
    }

    /// Numeric column as `f64`, one value per archetype. Missing cells are
    /// rejected since they cannot enter a linear expression.
    pub fn numeric_column(&self, name: &str) -> ArchiferResult<Vec<f64>> {
        self.numeric_cells(name)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| {
                cell.ok_or_else(|| {
                    ArchiferError::Table(format!("column '{name}' has no value in row {row}"))
                })
            })
            .collect()
    }

    /// Sum of a numeric column, skipping missing cells.
    pub fn sum(&self, column: &str) -> ArchiferResult<f64> {
        Ok(self.numeric_cells(column)?.into_iter().flatten().sum())
    }

    /// Sum of `column` per distinct value of `category`, skipping rows
    /// where either cell is missing.
    pub fn group_sum(&self, category: &str, column: &str) -> ArchiferResult<BTreeMap<String, f64>> {
        let labels = self.column_values(category)?;
        let values = self.numeric_cells(column)?;
        let mut totals = BTreeMap::new();
        for (row, value) in values.into_iter().enumerate() {
            if let (Some(label), Some(value)) = (labels.label(row), value) {
                *totals.entry(label).or_insert(0.0) += value;
            }
        }
        Ok(totals)
    }

    /// Row positions selected by `filter`.
    pub fn filter(&self, filter: &RowFilter) -> ArchiferResult<Vec<usize>> {
        let mask = filter.evaluate(self)?;
        Ok(mask
            .into_iter()
            .enumerate()
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect())
    }

    /// Rename a column in place. Returns false when `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> ArchiferResult<bool> {
        if !self.has_column(from) {
            return Ok(false);
        }
        self.frame.rename(from, to)?;
        if self.key_column.as_deref() == Some(from) {
            self.key_column = Some(to.to_string());
        }
        Ok(true)
    }

    fn series(&self, name: &str) -> ArchiferResult<&Series> {
        self.frame
            .column(name)
            .map_err(|_| ArchiferError::missing("column", name))
    }

    fn numeric_cells(&self, name: &str) -> ArchiferResult<Vec<Option<f64>>> {
        match self.column_values(name)? {
            ColumnValues::Number(cells) => Ok(cells),
            other => Err(ArchiferError::Table(format!(
                "column '{name}' is {}, expected numeric",
                other.kind()
            ))),
        }
    }
}

impl From<DataFrame> for ArchetypeTable {
    fn from(frame: DataFrame) -> Self {
        ArchetypeTable::new(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ArchetypeTable {
        let frame = df!(
            "id" => &["EFH_1950", "MFH_1970", "BUE_1990"],
            "Nutzung" => &["Wohnen", "Wohnen", "Buero"],
            "NGF" => &[150.0, 900.0, 1200.0],
            "Geschosse" => &[2i64, 5, 4],
        )
        .unwrap();
        ArchetypeTable::new(frame)
    }

    #[test]
    fn test_keys_default_to_position() {
        assert_eq!(table().keys().unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_keys_from_column() {
        let t = table().with_key_column("id").unwrap();
        assert_eq!(t.keys().unwrap(), vec!["EFH_1950", "MFH_1970", "BUE_1990"]);
        assert!(table().with_key_column("nope").unwrap_err().is_missing_key());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let frame = df!("id" => &["EFH", "MFH", "EFH"], "NGF" => &[1.0, 2.0, 3.0]).unwrap();
        let err = ArchetypeTable::new(frame).with_key_column("id").unwrap_err();
        assert!(matches!(err, ArchiferError::Table(ref m) if m.contains("duplicate archetype key 'EFH'")));

        // a missing key falls back to its position and may collide with a real key
        let frame = df!("id" => &[Some("1"), None], "NGF" => &[1.0, 2.0]).unwrap();
        let err = ArchetypeTable::new(frame).with_key_column("id").unwrap_err();
        assert!(matches!(err, ArchiferError::Table(ref m) if m.contains("'1'")));
    }

    #[test]
    fn test_sum_and_group_sum() {
        let t = table();
        assert_eq!(t.sum("NGF").unwrap(), 2250.0);
        assert_eq!(t.sum("Geschosse").unwrap(), 11.0);
        let groups = t.group_sum("Nutzung", "NGF").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Wohnen"], 1050.0);
        assert_eq!(groups["Buero"], 1200.0);
    }

    #[test]
    fn test_numeric_column_errors() {
        let t = table();
        assert_eq!(t.numeric_column("Geschosse").unwrap(), vec![2.0, 5.0, 4.0]);
        assert!(t.numeric_column("missing").unwrap_err().is_missing_key());
        assert!(matches!(
            t.numeric_column("Nutzung"),
            Err(ArchiferError::Table(_))
        ));

        let gaps = ArchetypeTable::new(df!("NGF" => &[Some(1.0), None]).unwrap());
        assert!(matches!(gaps.numeric_column("NGF"), Err(ArchiferError::Table(_))));
        assert_eq!(gaps.sum("NGF").unwrap(), 1.0);
    }

    #[test]
    fn test_rename_column() {
        let mut t = table().with_key_column("id").unwrap();
        assert!(t.rename_column("id", "archetype").unwrap());
        assert!(!t.rename_column("id", "other").unwrap());
        assert_eq!(t.key_column(), Some("archetype"));
        assert!(t.has_column("archetype"));
    }
}
