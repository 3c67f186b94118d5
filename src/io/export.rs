//! Write the analysis artifacts to a destination directory.
//!
//! One export produces exactly three files:
//! - `graphs.<format>`: the three-panel diagnostic figure
//! - `model_summary.txt`: the regression table
//! - `linearity_parameters.txt`: headline linearity metrics
//!
//! Files are written one after another; if a later write fails the earlier
//! files stay on disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;

use crate::domain::{CalibrationDataset, ImageFormat};
use crate::error::AppError;
use crate::fit::FittedModel;
use crate::plot::{DiagnosticFigure, PlotConfiguration};
use crate::report::{
    LinearityParameters, compute_diagnostics, format_linearity_parameters, format_model_summary,
};

pub const MODEL_SUMMARY_FILE: &str = "model_summary.txt";
pub const LINEARITY_PARAMETERS_FILE: &str = "linearity_parameters.txt";
const GRAPHS_STEM: &str = "graphs";

/// Format of auto-generated destination directory names.
pub const TIMESTAMP_DIR_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Where and how to export.
#[derive(Debug, Clone)]
pub struct ExportOptions<'a> {
    /// Explicit destination; created if absent, reused if present.
    pub destination: Option<&'a Path>,
    /// Parent of the auto-generated directory when `destination` is `None`.
    pub base_dir: &'a Path,
    /// Names the auto-generated directory and dates the model summary.
    pub timestamp: DateTime<Local>,
    pub image_format: ImageFormat,
    pub plot_config: &'a PlotConfiguration,
}

/// Paths written by a successful export, plus the metrics that were reported.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub directory: PathBuf,
    pub graphs: PathBuf,
    pub model_summary: PathBuf,
    pub linearity_parameters: PathBuf,
    pub parameters: LinearityParameters,
}

/// Resolve (and create) the destination directory.
///
/// Without an explicit destination, `<base_dir>/<YYYY-MM-DD_HHMMSS>_analysis`
/// is created and must not already exist.
pub fn resolve_destination(
    destination: Option<&Path>,
    base_dir: &Path,
    timestamp: &DateTime<Local>,
) -> Result<PathBuf, AppError> {
    match destination {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| AppError::io("Failed to create output directory", dir, e))?;
            Ok(dir.to_path_buf())
        }
        None => {
            let dir = base_dir.join(format!("{}_analysis", timestamp.format(TIMESTAMP_DIR_FORMAT)));
            fs::create_dir(&dir).map_err(|e| AppError::io("Failed to create output directory", &dir, e))?;
            Ok(dir)
        }
    }
}

/// Render the figure and write the summary and linearity parameters.
pub fn export(
    dataset: &CalibrationDataset,
    studentized_residuals: &[f64],
    model: &FittedModel,
    options: &ExportOptions<'_>,
) -> Result<ExportBundle, AppError> {
    let diagnostics = compute_diagnostics(dataset, studentized_residuals, model)?;
    let parameters = LinearityParameters::from_diagnostics(
        dataset,
        &diagnostics.studentized_residuals,
        &diagnostics.relative_errors,
    );

    // Build before touching the filesystem so bad plot settings fail cleanly.
    let figure = DiagnosticFigure::build(dataset, &diagnostics, model, options.plot_config)?;

    let directory = resolve_destination(options.destination, options.base_dir, &options.timestamp)?;
    let graphs = directory.join(format!("{GRAPHS_STEM}.{}", options.image_format.extension()));
    let model_summary = directory.join(MODEL_SUMMARY_FILE);
    let linearity_parameters = directory.join(LINEARITY_PARAMETERS_FILE);

    figure.render(&graphs, options.image_format)?;
    write_text(&model_summary, &format_model_summary(model, &options.timestamp))?;
    write_text(&linearity_parameters, &format_linearity_parameters(&parameters))?;

    info!("Wrote analysis to '{}'", directory.display());

    Ok(ExportBundle {
        directory,
        graphs,
        model_summary,
        linearity_parameters,
        parameters,
    })
}

fn write_text(path: &Path, contents: &str) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| AppError::io("Failed to create", path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| AppError::io("Failed to write", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempdir::TempDir;

    use crate::domain::{CalibrationPoint, FitMode};
    use crate::fit::fit;

    fn dataset() -> CalibrationDataset {
        CalibrationDataset::new(
            [(0.5, 130.0), (1.0, 262.0), (2.0, 540.0), (4.0, 1010.0), (8.0, 2070.0), (16.0, 3950.0)]
                .iter()
                .map(|&(concentration, response)| CalibrationPoint {
                    concentration,
                    response,
                })
                .collect(),
        )
        .unwrap()
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 25, 19, 1, 53).unwrap()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn auto_destination_uses_timestamp_and_refuses_reuse() {
        let base = TempDir::new("export").unwrap();
        let dir = resolve_destination(None, base.path(), &at()).unwrap();
        assert_eq!(dir, base.path().join("2026-03-25_190153_analysis"));
        assert!(dir.is_dir());

        assert!(resolve_destination(None, base.path(), &at()).is_err());
    }

    #[test]
    fn explicit_destination_is_created_then_reused() {
        let base = TempDir::new("export").unwrap();
        let target = base.path().join("nested").join("run");
        assert_eq!(resolve_destination(Some(&target), base.path(), &at()).unwrap(), target);
        assert_eq!(resolve_destination(Some(&target), base.path(), &at()).unwrap(), target);
    }

    #[test]
    fn writes_exactly_three_files() {
        let ds = dataset();
        let model = fit(&ds, FitMode::Ols).unwrap();
        let studentized = model.studentized_residuals().unwrap();
        let base = TempDir::new("export").unwrap();
        let config = PlotConfiguration::default();

        for format in [ImageFormat::Svg, ImageFormat::Png] {
            let target = base.path().join(format.extension());
            let options = ExportOptions {
                destination: Some(&target),
                base_dir: base.path(),
                timestamp: at(),
                image_format: format,
                plot_config: &config,
            };
            let bundle = export(&ds, &studentized, &model, &options).unwrap();

            let graphs = format!("graphs.{}", format.extension());
            assert_eq!(
                file_names(&bundle.directory),
                vec![graphs, LINEARITY_PARAMETERS_FILE.to_string(), MODEL_SUMMARY_FILE.to_string()]
            );
            assert!(fs::metadata(&bundle.model_summary).unwrap().len() > 0);
        }
    }

    #[test]
    fn parameters_file_is_deterministic() {
        let ds = dataset();
        let model = fit(&ds, FitMode::Ols).unwrap();
        let studentized = model.studentized_residuals().unwrap();
        let base = TempDir::new("export").unwrap();
        let config = PlotConfiguration::default();

        let mut contents = Vec::new();
        for name in ["first", "second"] {
            let target = base.path().join(name);
            let options = ExportOptions {
                destination: Some(&target),
                base_dir: base.path(),
                timestamp: at(),
                image_format: ImageFormat::Svg,
                plot_config: &config,
            };
            let bundle = export(&ds, &studentized, &model, &options).unwrap();
            contents.push(fs::read_to_string(bundle.linearity_parameters).unwrap());
        }
        assert_eq!(contents[0], contents[1]);
        assert!(contents[0].contains("Min concentration:"));
    }

    #[test]
    fn mismatched_residuals_are_rejected_before_writing() {
        let ds = dataset();
        let model = fit(&ds, FitMode::Ols).unwrap();
        let base = TempDir::new("export").unwrap();
        let config = PlotConfiguration::default();
        let options = ExportOptions {
            destination: None,
            base_dir: base.path(),
            timestamp: at(),
            image_format: ImageFormat::Svg,
            plot_config: &config,
        };
        assert!(export(&ds, &[0.1, 0.2], &model, &options).is_err());
        assert!(file_names(base.path()).is_empty());
    }
}
