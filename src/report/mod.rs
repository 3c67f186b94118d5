//! Reporting utilities: per-row diagnostics, linearity metrics and formatted
//! text output.

pub mod format;

pub use format::*;

use log::warn;

use crate::domain::{CalibrationDataset, DiagnosticsResult};
use crate::error::AppError;
use crate::fit::FittedModel;

/// |studentized residual| above this flags a potential outlier.
pub const STUDENTIZED_THRESHOLD: f64 = 2.0;
/// % relative error at which a standard needs attention.
pub const RELATIVE_ERROR_CAUTION: f64 = 15.0;
/// % relative error at which a standard fails.
pub const RELATIVE_ERROR_FAILURE: f64 = 20.0;

/// Percent relative error of each fitted concentration: `|residual / c| * 100`.
///
/// The ratio is undefined for a zero concentration (a blank). Such rows get
/// `f64::INFINITY`, are logged, and are left out of the maximum and of the
/// threshold counts in [`LinearityParameters`].
pub fn compute_relative_errors(concentrations: &[f64], model: &FittedModel) -> Result<Vec<f64>, AppError> {
    let residuals = model.residuals();
    if residuals.len() != concentrations.len() {
        return Err(AppError::Fit(format!(
            "{} concentrations supplied for a model fitted on {} rows",
            concentrations.len(),
            residuals.len()
        )));
    }

    Ok(concentrations
        .iter()
        .zip(residuals)
        .enumerate()
        .map(|(idx, (c, e))| {
            if *c == 0.0 {
                warn!("Relative error is undefined for row {idx}: standard concentration is zero");
                f64::INFINITY
            } else {
                (e / c).abs() * 100.0
            }
        })
        .collect())
}

/// Pair studentized residuals with relative errors, one entry per row of `dataset`.
pub fn compute_diagnostics(
    dataset: &CalibrationDataset,
    studentized_residuals: &[f64],
    model: &FittedModel,
) -> Result<DiagnosticsResult, AppError> {
    if studentized_residuals.len() != dataset.len() {
        return Err(AppError::Fit(format!(
            "{} studentised residuals supplied for {} rows",
            studentized_residuals.len(),
            dataset.len()
        )));
    }
    Ok(DiagnosticsResult {
        studentized_residuals: studentized_residuals.to_vec(),
        relative_errors: compute_relative_errors(&dataset.concentrations(), model)?,
    })
}

/// Headline numbers used to judge linearity.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearityParameters {
    pub max_abs_studentized_residual: f64,
    pub max_relative_error: f64,
    pub min_concentration: f64,
    pub max_concentration: f64,
    /// Rows with |studentized residual| > 2.
    pub residual_outliers: usize,
    /// Rows with relative error above the caution threshold.
    pub caution_errors: usize,
    /// Rows with relative error above the failure threshold.
    pub failed_errors: usize,
}

impl LinearityParameters {
    pub fn from_diagnostics(dataset: &CalibrationDataset, studentized: &[f64], relative_errors: &[f64]) -> Self {
        let (min_concentration, max_concentration) = dataset.concentration_range();
        Self {
            max_abs_studentized_residual: max_finite(studentized.iter().map(|v| v.abs())),
            max_relative_error: max_finite(relative_errors.iter().copied()),
            min_concentration,
            max_concentration,
            residual_outliers: studentized.iter().filter(|v| v.abs() > STUDENTIZED_THRESHOLD).count(),
            caution_errors: count_above(relative_errors, RELATIVE_ERROR_CAUTION),
            failed_errors: count_above(relative_errors, RELATIVE_ERROR_FAILURE),
        }
    }

    /// Log threshold breaches; the run itself never fails on them.
    pub fn log_breaches(&self) {
        if self.residual_outliers > 0 {
            warn!(
                "{} point(s) have |studentised residual| > {STUDENTIZED_THRESHOLD}",
                self.residual_outliers
            );
        }
        if self.failed_errors > 0 {
            warn!(
                "{} point(s) exceed {RELATIVE_ERROR_FAILURE}% relative error",
                self.failed_errors
            );
        } else if self.caution_errors > 0 {
            warn!(
                "{} point(s) exceed {RELATIVE_ERROR_CAUTION}% relative error",
                self.caution_errors
            );
        }
    }
}

fn count_above(values: &[f64], threshold: f64) -> usize {
    values.iter().filter(|v| v.is_finite() && **v > threshold).count()
}

/// Largest finite value, or NaN when there is none.
fn max_finite(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(f64::NAN)
}
