//! The analysis pipeline shared by the CLI and the integration tests:
//! import -> fit -> diagnostics -> export.

use std::path::Path;

use chrono::{DateTime, Local};
use log::info;

use crate::domain::{AnalysisConfig, CalibrationDataset};
use crate::error::AppError;
use crate::fit::FittedModel;
use crate::io::{ExportBundle, ExportOptions, ImportOptions};
use crate::plot::PlotConfiguration;

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: CalibrationDataset,
    pub model: FittedModel,
    pub studentized_residuals: Vec<f64>,
    pub export: ExportBundle,
}

/// Execute the full analysis.
///
/// `base_dir` and `now` decide the auto-generated destination when
/// `config.output_dir` is unset.
pub fn run_analysis(config: &AnalysisConfig, base_dir: &Path, now: DateTime<Local>) -> Result<RunOutput, AppError> {
    // Load the plot configuration first so a bad file fails before any work.
    let plot_config = match &config.plot_config {
        Some(path) => crate::io::read_plot_config(path)?,
        None => PlotConfiguration::default(),
    };

    let import_options = ImportOptions {
        header_row: config.header_row,
        max_rows: config.max_rows,
        skip_rows: config.skip_rows,
        delimiter: config.delimiter,
    };
    let dataset = crate::io::import_data(
        &config.input_path,
        &config.response_column,
        &config.standards_column,
        &import_options,
    )?;

    let model = crate::fit::fit(&dataset, config.fit_mode)?;
    info!(
        "{} fit: intercept={:.6}, slope={:.6}, R²={:.6}",
        model.mode(),
        model.intercept(),
        model.slope(),
        model.statistics().r_squared
    );

    let studentized_residuals = model.studentized_residuals()?;

    let options = ExportOptions {
        destination: config.output_dir.as_deref(),
        base_dir,
        timestamp: now,
        image_format: config.image_format,
        plot_config: &plot_config,
    };
    let export = crate::io::export(&dataset, &studentized_residuals, &model, &options)?;
    export.parameters.log_breaches();

    Ok(RunOutput {
        dataset,
        model,
        studentized_residuals,
        export,
    })
}
