pub mod compile;
pub mod fit;
pub mod summary;

use anyhow::{Context, Result};
use archifer_algo::{compile_config, CompiledModel};
use archifer_io::{load_archetypes, load_config};
use std::path::Path;

/// Load configuration and table, then compile them.
pub(crate) fn load_and_compile(
    config_path: &Path,
    table_path: &Path,
    key_column: Option<&str>,
) -> Result<CompiledModel> {
    let config = load_config(config_path)?;
    let table = load_archetypes(table_path, key_column)?;
    compile_config(&config, &table)
        .with_context(|| format!("compiling constraints of {}", config_path.display()))
}
