//! # archifer-io
//!
//! File loaders: fitting configurations (YAML / JSON) and archetype tables
//! (CSV, Excel workbooks, Parquet with the `parquet` feature).

pub mod config;
pub mod table;

pub use config::{load_config, parse_config_json, parse_config_yaml};
pub use table::{
    load_archetypes, load_sector, read_frame, DEFAULT_SECTOR_TABLE, SOURCE_FLOOR_AREA_HEADER,
};
