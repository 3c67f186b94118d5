//! Calibration line fitting.
//!
//! The regression is deliberately oriented as **concentration ~ response**
//! (inverse calibration): the design matrix holds an intercept column and the
//! instrument response, and the dependent variable is the known standard
//! concentration.
//!
//! Two modes are supported:
//!
//! - **OLS**: one ordinary least squares fit; influence diagnostics come
//!   straight from it.
//! - **WLS**: a two-step procedure.
//!   1. Fit weighted least squares with `w_i = (1 / c_i)^2` for coefficients,
//!      standard errors and summary statistics.
//!   2. Whiten the design and dependent variable by `sqrt(w_i)` and fit an
//!      auxiliary *unweighted* model on them. Studentized residuals and
//!      leverages are taken from this auxiliary model, because the weighted
//!      model's own residual diagnostics are not on a common scale.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::domain::{CalibrationDataset, FitMode, RESPONSE_COLUMN};
use crate::error::AppError;
use crate::fit::statistics::FitStatistics;
use crate::math::{LeastSquaresFit, whiten_matrix, whiten_vector};

/// Two coefficients plus one extra degree of freedom for deleted residuals.
pub const MIN_OBSERVATIONS: usize = 4;

/// Coefficient names in design-matrix column order.
pub const COEFFICIENT_NAMES: [&str; 2] = ["Intercept", RESPONSE_COLUMN];

/// An immutable fitted calibration model.
#[derive(Debug, Clone)]
pub struct FittedModel {
    mode: FitMode,
    /// The model that supplies coefficients and summary statistics.
    primary: LeastSquaresFit,
    /// WLS only: unweighted fit on whitened data, used for influence diagnostics.
    auxiliary: Option<LeastSquaresFit>,
    statistics: FitStatistics,
}

impl FittedModel {
    pub fn mode(&self) -> FitMode {
        self.mode
    }

    pub fn intercept(&self) -> f64 {
        self.primary.beta[0]
    }

    pub fn slope(&self) -> f64 {
        self.primary.beta[1]
    }

    /// Raw residuals `concentration - fitted`, in input order.
    pub fn residuals(&self) -> &[f64] {
        self.primary.residuals.as_slice()
    }

    pub fn statistics(&self) -> &FitStatistics {
        &self.statistics
    }

    /// Externally studentized residuals, one per observation.
    ///
    /// OLS reads them off the fit itself; WLS uses the auxiliary model fitted
    /// on whitened data.
    pub fn studentized_residuals(&self) -> Result<Vec<f64>, AppError> {
        let source = match self.mode {
            FitMode::Ols => &self.primary,
            FitMode::Wls => self.auxiliary.as_ref().ok_or_else(|| {
                AppError::Fit("weighted model is missing its whitened auxiliary fit".to_string())
            })?,
        };
        let resid = source.externally_studentized_residuals().ok_or_else(|| {
            AppError::Fit(format!(
                "at least {MIN_OBSERVATIONS} observations are needed for studentized residuals"
            ))
        })?;
        Ok(resid.iter().copied().collect())
    }

    /// Response implied by a concentration, by inverting `c = intercept + slope * r`.
    pub fn response_at(&self, concentration: f64) -> f64 {
        (concentration - self.intercept()) / self.slope()
    }
}

/// Fit the calibration line for `dataset`.
pub fn fit(dataset: &CalibrationDataset, mode: FitMode) -> Result<FittedModel, AppError> {
    let n = dataset.len();
    if n < MIN_OBSERVATIONS {
        return Err(AppError::Fit(format!(
            "{n} calibration point(s) supplied; at least {MIN_OBSERVATIONS} are required"
        )));
    }

    let responses = dataset.responses();
    let first = responses[0];
    if responses.iter().all(|r| *r == first) {
        return Err(AppError::Fit(
            "every response is identical, so the design matrix is singular".to_string(),
        ));
    }

    let x = design_matrix(&responses);
    let y = DVector::from_vec(dataset.concentrations());

    let model = match mode {
        FitMode::Ols => {
            let primary = LeastSquaresFit::fit(&x, &y, None).ok_or_else(singular)?;
            let statistics = FitStatistics::from_fit(&primary, &y, &COEFFICIENT_NAMES)?;
            FittedModel {
                mode,
                primary,
                auxiliary: None,
                statistics,
            }
        }
        FitMode::Wls => {
            let weights = inverse_square_weights(&y)?;

            // Step 1: weighted fit for coefficients and summary statistics.
            let primary = LeastSquaresFit::fit(&x, &y, Some(&weights)).ok_or_else(singular)?;
            let statistics = FitStatistics::from_fit(&primary, &y, &COEFFICIENT_NAMES)?;

            // Step 2: unweighted fit on whitened data for influence diagnostics.
            let xw = whiten_matrix(&x, &weights);
            let yw = whiten_vector(&y, &weights);
            let auxiliary = LeastSquaresFit::fit(&xw, &yw, None).ok_or_else(singular)?;

            FittedModel {
                mode,
                primary,
                auxiliary: Some(auxiliary),
                statistics,
            }
        }
    };

    debug!(
        "{} fit: intercept={:.6e} slope={:.6e} R²={:.6}",
        mode,
        model.intercept(),
        model.slope(),
        model.statistics.r_squared
    );

    Ok(model)
}

/// `[1, response]` rows.
pub fn design_matrix(responses: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(responses.len(), 2, |i, j| if j == 0 { 1.0 } else { responses[i] })
}

/// `w_i = (1 / c_i)^2`; every concentration must be strictly positive.
pub fn inverse_square_weights(concentrations: &DVector<f64>) -> Result<DVector<f64>, AppError> {
    if let Some((idx, c)) = concentrations.iter().enumerate().find(|(_, c)| **c <= 0.0) {
        return Err(AppError::Fit(format!(
            "WLS weights (1/concentration)^2 need strictly positive concentrations; row {idx} has {c}"
        )));
    }
    Ok(concentrations.map(|c| (1.0 / c).powi(2)))
}

fn singular() -> AppError {
    AppError::Fit("design matrix is singular or too ill-conditioned to solve".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CalibrationPoint;
    use approx::assert_relative_eq;

    fn dataset(pairs: &[(f64, f64)]) -> CalibrationDataset {
        CalibrationDataset::new(
            pairs
                .iter()
                .map(|&(concentration, response)| CalibrationPoint {
                    concentration,
                    response,
                })
                .collect(),
        )
        .unwrap()
    }

    /// Serial dilution in triplicate; response ≈ 250 * c + 40 with scatter.
    fn triplicates() -> CalibrationDataset {
        let mut pairs = Vec::new();
        let noise = [-3.1, 1.7, 2.4, -0.8, 0.6, -2.2, 3.5, -1.4, 0.9, -2.7, 1.1, 2.0];
        let mut k = 0;
        for c in [0.25, 0.5, 1.0, 2.0] {
            for _ in 0..3 {
                pairs.push((c, 250.0 * c + 40.0 + noise[k] * (1.0 + c)));
                k += 1;
            }
        }
        dataset(&pairs)
    }

    #[test]
    fn ols_recovers_exact_inverse_line() {
        // c = -0.2 + 0.01 * r
        let pairs: Vec<(f64, f64)> = [20.0, 50.0, 120.0, 220.0, 520.0]
            .iter()
            .map(|&r| (-0.2 + 0.01 * r, r))
            .collect();
        let model = fit(&dataset(&pairs), FitMode::Ols).unwrap();
        assert_relative_eq!(model.intercept(), -0.2, epsilon = 1e-9);
        assert_relative_eq!(model.slope(), 0.01, epsilon = 1e-12);
        assert_relative_eq!(model.response_at(1.0), 120.0, epsilon = 1e-6);
    }

    #[test]
    fn studentized_residual_count_matches_rows() {
        let ds = triplicates();
        for mode in [FitMode::Ols, FitMode::Wls] {
            let model = fit(&ds, mode).unwrap();
            assert_eq!(model.studentized_residuals().unwrap().len(), ds.len());
            assert_eq!(model.residuals().len(), ds.len());
        }
    }

    #[test]
    fn wls_coefficients_match_weighted_normal_equations() {
        let ds = triplicates();
        let model = fit(&ds, FitMode::Wls).unwrap();

        let x = design_matrix(&ds.responses());
        let y = DVector::from_vec(ds.concentrations());
        let w = DMatrix::from_diagonal(&y.map(|c| 1.0 / (c * c)));
        let beta = (x.transpose() * &w * &x).try_inverse().unwrap() * x.transpose() * &w * &y;

        assert_relative_eq!(model.intercept(), beta[0], max_relative = 1e-8);
        assert_relative_eq!(model.slope(), beta[1], max_relative = 1e-8);
        assert_eq!(model.mode(), FitMode::Wls);
    }

    #[test]
    fn wls_studentized_residuals_come_from_whitened_auxiliary_fit() {
        let ds = triplicates();
        let model = fit(&ds, FitMode::Wls).unwrap();

        let y = DVector::from_vec(ds.concentrations());
        let w = inverse_square_weights(&y).unwrap();
        let aux = LeastSquaresFit::fit(
            &whiten_matrix(&design_matrix(&ds.responses()), &w),
            &whiten_vector(&y, &w),
            None,
        )
        .unwrap();
        let expected = aux.externally_studentized_residuals().unwrap();

        let got = model.studentized_residuals().unwrap();
        for (a, b) in got.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn wls_rejects_zero_concentration_before_fitting() {
        let ds = dataset(&[(0.0, 1.0), (1.0, 10.0), (2.0, 21.0), (3.0, 29.0), (4.0, 41.0)]);
        let err = fit(&ds, FitMode::Wls).unwrap_err();
        assert!(matches!(err, AppError::Fit(_)));
        assert!(err.to_string().contains("row 0"));

        // The same data is fine for OLS.
        assert!(fit(&ds, FitMode::Ols).is_ok());
    }

    #[test]
    fn identical_responses_are_singular() {
        let ds = dataset(&[(1.0, 5.0), (2.0, 5.0), (3.0, 5.0), (4.0, 5.0)]);
        let err = fit(&ds, FitMode::Ols).unwrap_err();
        assert!(err.to_string().contains("singular"));
    }

    #[test]
    fn too_few_points_fail() {
        let ds = dataset(&[(1.0, 5.0), (2.0, 9.0), (3.0, 15.0)]);
        assert!(fit(&ds, FitMode::Ols).is_err());
    }

    #[test]
    fn planted_outlier_exceeds_threshold() {
        let mut pairs: Vec<(f64, f64)> = (1..=10)
            .map(|i| {
                let c = i as f64;
                let wiggle = if i % 2 == 0 { 0.4 } else { -0.4 };
                (c, 100.0 * c + wiggle)
            })
            .collect();
        pairs[6].1 += 60.0;
        let model = fit(&dataset(&pairs), FitMode::Ols).unwrap();
        let t = model.studentized_residuals().unwrap();
        let worst = t
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(worst, 6);
        assert!(t[6].abs() > 2.0);
    }
}
