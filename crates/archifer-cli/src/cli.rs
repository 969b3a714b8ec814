use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "archifer", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Floor-area totals and breakdowns of an archetype table
    Summary {
        /// Archetype table (CSV, Excel or Parquet)
        #[arg(value_hint = ValueHint::FilePath, default_value = archifer_io::DEFAULT_SECTOR_TABLE)]
        table: PathBuf,
        /// Category columns to break down by
        #[arg(long = "category", default_value = "Nutzung")]
        categories: Vec<String>,
        /// Numeric columns to total
        #[arg(long = "column", default_value = "NGF")]
        columns: Vec<String>,
        /// Reference year of the building stock
        #[arg(long)]
        year: Option<u32>,
    },
    /// Compile a fitting configuration into a linear model
    Compile {
        /// Fitting configuration (YAML or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Archetype table (CSV, Excel or Parquet)
        #[arg(value_hint = ValueHint::FilePath)]
        table: PathBuf,
        /// Column holding archetype keys (defaults to row position)
        #[arg(long)]
        key_column: Option<String>,
        /// Write the model in CPLEX LP format
        #[arg(long, value_hint = ValueHint::FilePath)]
        lp_out: Option<PathBuf>,
    },
    /// Compile and solve: fit archetype counts to the configured targets
    Fit {
        /// Fitting configuration (YAML or JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Archetype table (CSV, Excel or Parquet)
        #[arg(value_hint = ValueHint::FilePath)]
        table: PathBuf,
        /// Column holding archetype keys (defaults to row position)
        #[arg(long)]
        key_column: Option<String>,
        /// LP solver backend (clarabel, highs)
        #[arg(long, default_value = "clarabel")]
        solver: String,
        /// Write counts and slacks as JSON
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}
