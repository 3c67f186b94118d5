//! Shared domain types.
//!
//! These types are kept small and plain so they can be passed read-only
//! through every pipeline stage (import -> fit -> diagnostics -> export).

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

/// Canonical name of the dependent column after import.
pub const STANDARDS_COLUMN: &str = "standard_concentrations";
/// Canonical name of the instrument response column after import.
pub const RESPONSE_COLUMN: &str = "response";

/// How the calibration line is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FitMode {
    /// Ordinary least squares.
    Ols,
    /// Weighted least squares with `w = (1 / concentration)^2`.
    Wls,
}

impl FitMode {
    pub fn display_name(self) -> &'static str {
        match self {
            FitMode::Ols => "OLS",
            FitMode::Wls => "WLS",
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// File format of the rendered diagnostic figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageFormat {
    Svg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }
}

/// One calibration standard: known concentration and measured response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub concentration: f64,
    pub response: f64,
}

/// Cleaned calibration data, in input-file order.
///
/// Invariants (enforced by the importer): non-empty, every value finite, every
/// concentration non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDataset {
    points: Vec<CalibrationPoint>,
}

impl CalibrationDataset {
    /// Build a dataset, checking the invariants the rest of the pipeline relies on.
    pub fn new(points: Vec<CalibrationPoint>) -> Result<Self, String> {
        if points.is_empty() {
            return Err("Calibration dataset is empty".to_string());
        }
        for (idx, p) in points.iter().enumerate() {
            if !(p.concentration.is_finite() && p.response.is_finite()) {
                return Err(format!("Row {idx} contains a non-finite value"));
            }
            if p.concentration < 0.0 {
                return Err(format!(
                    "Row {idx} has a negative standard concentration ({})",
                    p.concentration
                ));
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn concentrations(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.concentration).collect()
    }

    pub fn responses(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.response).collect()
    }

    pub fn concentration_range(&self) -> (f64, f64) {
        self.points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.concentration), hi.max(p.concentration))
        })
    }
}

/// Per-row diagnostics, aligned by index with the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsResult {
    pub studentized_residuals: Vec<f64>,
    pub relative_errors: Vec<f64>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub input_path: PathBuf,
    pub response_column: String,
    pub standards_column: String,
    pub header_row: usize,
    pub max_rows: Option<usize>,
    pub skip_rows: Option<usize>,
    pub delimiter: u8,

    pub fit_mode: FitMode,

    pub image_format: ImageFormat,
    pub output_dir: Option<PathBuf>,
    pub plot_config: Option<PathBuf>,
}
