//! Linear least squares with influence diagnostics.
//!
//! We solve small regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - Rows are scaled by `sqrt(w_i)` ("whitened") and the resulting ordinary
//!   least squares problem is solved with SVD, which is robust for tall design
//!   matrices. (Nalgebra's `QR::solve` is intended for square systems and will
//!   panic for non-square matrices.)
//! - The unscaled covariance `(X^T W X)^-1` is kept alongside the coefficients
//!   so that standard errors and leverages can be derived later.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Scale every row of `x` by `sqrt(w_i)`.
pub fn whiten_matrix(x: &DMatrix<f64>, weights: &DVector<f64>) -> DMatrix<f64> {
    let mut out = x.clone();
    for (i, w) in weights.iter().enumerate() {
        let s = w.sqrt();
        out.row_mut(i).scale_mut(s);
    }
    out
}

/// Scale every entry of `y` by `sqrt(w_i)`.
pub fn whiten_vector(y: &DVector<f64>, weights: &DVector<f64>) -> DVector<f64> {
    y.zip_map(weights, |v, w| v * w.sqrt())
}

/// A fitted (optionally weighted) linear least squares model.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    /// Design matrix as supplied (not whitened).
    pub design: DMatrix<f64>,
    pub weights: DVector<f64>,
    pub beta: DVector<f64>,
    /// Raw residuals `y - Xβ`.
    pub residuals: DVector<f64>,
    /// `(X^T W X)^-1`.
    pub normalized_cov: DMatrix<f64>,
    /// Weighted residual sum of squares `Σ w_i e_i^2`.
    pub ssr: f64,
}

impl LeastSquaresFit {
    /// Fit `y ~ X` with optional per-observation weights.
    ///
    /// Returns `None` when the weighted normal matrix cannot be inverted or the
    /// solve produces non-finite coefficients.
    pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>, weights: Option<&DVector<f64>>) -> Option<Self> {
        let n = x.nrows();
        if y.len() != n || n < x.ncols() {
            return None;
        }

        let weights = weights.cloned().unwrap_or_else(|| DVector::from_element(n, 1.0));
        if weights.len() != n || weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return None;
        }

        let xw = whiten_matrix(x, &weights);
        let yw = whiten_vector(y, &weights);

        let beta = solve_least_squares(&xw, &yw)?;
        let normalized_cov = (xw.transpose() * &xw).try_inverse()?;
        if normalized_cov.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let residuals = y - x * &beta;
        let ssr = residuals
            .iter()
            .zip(weights.iter())
            .map(|(e, w)| w * e * e)
            .sum();

        Some(Self {
            design: x.clone(),
            weights,
            beta,
            residuals,
            normalized_cov,
            ssr,
        })
    }

    pub fn nobs(&self) -> usize {
        self.design.nrows()
    }

    /// Number of estimated parameters.
    pub fn n_params(&self) -> usize {
        self.design.ncols()
    }

    pub fn df_resid(&self) -> usize {
        self.nobs().saturating_sub(self.n_params())
    }

    /// Residual variance estimate `ssr / df_resid`.
    pub fn scale(&self) -> f64 {
        self.ssr / self.df_resid() as f64
    }

    /// Residuals scaled by `sqrt(w_i)`.
    pub fn whitened_residuals(&self) -> DVector<f64> {
        whiten_vector(&self.residuals, &self.weights)
    }

    /// Standard errors of the coefficients.
    pub fn std_errors(&self) -> DVector<f64> {
        let scale = self.scale();
        DVector::from_iterator(
            self.n_params(),
            self.normalized_cov.diagonal().iter().map(|v| (v * scale).sqrt()),
        )
    }

    /// Diagonal of the hat matrix, `h_ii = w_i x_i^T (X^T W X)^-1 x_i`.
    pub fn leverage(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.nobs(),
            (0..self.nobs()).map(|i| {
                let row = self.design.row(i);
                let h = (&row * &self.normalized_cov * row.transpose())[(0, 0)];
                self.weights[i] * h
            }),
        )
    }

    /// Externally studentized (deleted) residuals.
    ///
    /// `t_i = ẽ_i / (s_(i) sqrt(1 - h_ii))`, where `ẽ` are whitened residuals
    /// and `s_(i)^2 = (ssr - ẽ_i^2 / (1 - h_ii)) / (n - p - 1)` is the residual
    /// variance with observation `i` deleted.
    ///
    /// Returns `None` when there is no degree of freedom left after deletion.
    /// A point whose deleted variance collapses to zero (perfect fit) gets 0.
    pub fn externally_studentized_residuals(&self) -> Option<DVector<f64>> {
        let n = self.nobs();
        let p = self.n_params();
        if n <= p + 1 {
            return None;
        }
        let df = (n - p - 1) as f64;
        let resid = self.whitened_residuals();
        let leverage = self.leverage();

        Some(DVector::from_iterator(
            n,
            (0..n).map(|i| {
                let e = resid[i];
                let one_minus_h = 1.0 - leverage[i];
                if one_minus_h <= f64::EPSILON {
                    return f64::NAN;
                }
                let deleted_var = ((self.ssr - e * e / one_minus_h) / df).max(0.0);
                let denom = (deleted_var * one_minus_h).sqrt();
                if denom > 0.0 { e / denom } else { 0.0 }
            }),
        ))
    }

    /// Ratio of the largest to smallest singular value of the whitened design.
    pub fn condition_number(&self) -> f64 {
        let sv = whiten_matrix(&self.design, &self.weights).singular_values();
        let max = sv.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = sv.iter().cloned().fold(f64::INFINITY, f64::min);
        max / min
    }
}
