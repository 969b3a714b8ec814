use anyhow::{Context, Result};
use archifer_core::FitConfig;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Load a fitting configuration. The format follows the extension
/// (`.yaml`/`.yml`, `.json`); anything else is tried as YAML, then JSON.
///
/// Only the document shape is checked here. Constraint entries are
/// validated when they are compiled; [`FitConfig::check`] findings are
/// logged as warnings.
pub fn load_config(path: &Path) -> Result<FitConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading fitting config '{}'", path.display()))?;
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            parse_config_yaml(&data)?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => parse_config_json(&data)?,
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing fitting config")?,
    };

    debug!(
        path = %path.display(),
        targets = config.targets.len(),
        weights = config.weights.len(),
        constraints = config.constraints.len(),
        "loaded fitting config"
    );
    for finding in config.check() {
        warn!(path = %path.display(), "{finding}");
    }
    Ok(config)
}

pub fn parse_config_yaml(data: &str) -> Result<FitConfig> {
    // an empty document means "no sections"
    if data.trim().is_empty() {
        return Ok(FitConfig::default());
    }
    serde_yaml::from_str(data).context("parsing fitting config yaml")
}

pub fn parse_config_json(data: &str) -> Result<FitConfig> {
    serde_json::from_str(data).context("parsing fitting config json")
}
