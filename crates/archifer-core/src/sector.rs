//! Building sector view over an archetype table
//!
//! A [`BuildingSector`] is an archetype table plus the reference year it
//! describes. It reports the total net floor area and the per-category
//! breakdowns that would otherwise end up in a stacked bar chart.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ArchiferResult;
use crate::table::ArchetypeTable;

/// Canonical net floor area column (Nettogrundfläche, m²).
pub const FLOOR_AREA_COLUMN: &str = "NGF";
/// Building usage column used as the default breakdown category.
pub const USAGE_COLUMN: &str = "Nutzung";
pub const DEFAULT_YEAR: u32 = 2025;

/// Totals of one variable per category value.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub variable: String,
    pub category: String,
    pub totals: BTreeMap<String, f64>,
}

impl Breakdown {
    pub fn total(&self) -> f64 {
        self.totals.values().sum()
    }
}

#[derive(Debug, Clone)]
pub struct BuildingSector {
    table: ArchetypeTable,
    pub year: u32,
    pub name: String,
}

impl BuildingSector {
    pub fn new(table: ArchetypeTable, year: Option<u32>) -> Self {
        let year = year.unwrap_or(DEFAULT_YEAR);
        Self {
            table,
            year,
            name: format!("Gebäudesektor {year}"),
        }
    }

    pub fn table(&self) -> &ArchetypeTable {
        &self.table
    }

    /// Total net floor area in m².
    pub fn nfa(&self) -> ArchiferResult<f64> {
        self.table.sum(FLOOR_AREA_COLUMN)
    }

    /// One breakdown per (variable, category) pair; empty slices fall back
    /// to `NGF` by `Nutzung`.
    pub fn breakdown(
        &self,
        variables: &[&str],
        categorization: &[&str],
    ) -> ArchiferResult<Vec<Breakdown>> {
        let variables = if variables.is_empty() {
            &[FLOOR_AREA_COLUMN][..]
        } else {
            variables
        };
        let categorization = if categorization.is_empty() {
            &[USAGE_COLUMN][..]
        } else {
            categorization
        };
        let mut out = Vec::with_capacity(variables.len() * categorization.len());
        for variable in variables {
            for category in categorization {
                out.push(Breakdown {
                    variable: variable.to_string(),
                    category: category.to_string(),
                    totals: self.table.group_sum(category, variable)?,
                });
            }
        }
        Ok(out)
    }
}

impl fmt::Display for BuildingSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.nfa() {
            Ok(area) => write!(f, "Building Sector ({}): {:.1} mio m²", self.year, area / 1e6),
            Err(_) => write!(f, "Building Sector ({}): floor area unavailable", self.year),
        }
    }
}
