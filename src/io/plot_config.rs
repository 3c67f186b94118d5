//! Read plot configuration files.
//!
//! The file is a JSON object keyed by scope (`calibration_attrs`,
//! `residual_attrs`, `errors_attrs`, `global_attrs`, `figure_attrs`), each
//! mapping directive names to values. See `plot::config` for the directive set.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::error::AppError;
use crate::plot::PlotConfiguration;

/// Load a plot configuration file.
pub fn read_plot_config(path: &Path) -> Result<PlotConfiguration, AppError> {
    let file = File::open(path).map_err(|e| AppError::io("Failed to open plot configuration", path, e))?;
    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::Config(format!("Invalid plot configuration JSON '{}': {e}", path.display())))?;
    let config = PlotConfiguration::from_json(&value)?;
    debug!("Loaded plot configuration from '{}': {config:?}", path.display());
    Ok(config)
}
