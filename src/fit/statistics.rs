//! Summary statistics for a fitted calibration model.
//!
//! Conventions follow the usual regression-table output of statistics
//! packages: weighted, centered total sum of squares; Student-t inference on
//! coefficients; Gaussian log-likelihood (with the weight Jacobian term for
//! WLS); residual-shape tests computed on whitened residuals.

use nalgebra::DVector;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};

use crate::error::AppError;
use crate::math::LeastSquaresFit;

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientRow {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
    /// Lower bound of the 95% confidence interval.
    pub ci_lower: f64,
    /// Upper bound of the 95% confidence interval.
    pub ci_upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitStatistics {
    pub nobs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: f64,
    pub jarque_bera: f64,
    pub jarque_bera_p: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub condition_number: f64,
    pub coefficients: Vec<CoefficientRow>,
}

impl FitStatistics {
    /// Derive summary statistics for `fit`, whose dependent variable was `y`.
    pub fn from_fit(fit: &LeastSquaresFit, y: &DVector<f64>, names: &[&str]) -> Result<Self, AppError> {
        let nobs = fit.nobs();
        let k = fit.n_params();
        let df_model = k - 1;
        let df_resid = fit.df_resid();
        if df_resid == 0 {
            return Err(AppError::Fit("no residual degrees of freedom".to_string()));
        }

        let w = &fit.weights;
        let w_sum = w.sum();
        let y_bar = y.dot(w) / w_sum;
        let tss: f64 = y.iter().zip(w.iter()).map(|(v, wi)| wi * (v - y_bar).powi(2)).sum();
        let ssr = fit.ssr;

        let r_squared = 1.0 - ssr / tss;
        let adj_r_squared = 1.0 - (1.0 - r_squared) * (nobs as f64 - 1.0) / df_resid as f64;

        let scale = fit.scale();
        let f_statistic = ((tss - ssr) / df_model as f64) / scale;
        let f_dist = FisherSnedecor::new(df_model as f64, df_resid as f64)
            .map_err(|e| AppError::Fit(format!("F distribution: {e}")))?;
        let f_p_value = upper_tail(&f_dist, f_statistic);

        let n = nobs as f64;
        let log_likelihood = -n / 2.0 * ((2.0 * std::f64::consts::PI * ssr / n).ln() + 1.0)
            + 0.5 * w.iter().map(|wi| wi.ln()).sum::<f64>();
        let aic = -2.0 * log_likelihood + 2.0 * k as f64;
        let bic = -2.0 * log_likelihood + k as f64 * n.ln();

        let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
            .map_err(|e| AppError::Fit(format!("Student-t distribution: {e}")))?;
        let t_crit = t_dist.inverse_cdf(0.975);
        let std_errors = fit.std_errors();
        let coefficients = names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let estimate = fit.beta[j];
                let std_error = std_errors[j];
                let t_value = estimate / std_error;
                CoefficientRow {
                    name: (*name).to_string(),
                    estimate,
                    std_error,
                    t_value,
                    p_value: 2.0 * upper_tail(&t_dist, t_value.abs()),
                    ci_lower: estimate - t_crit * std_error,
                    ci_upper: estimate + t_crit * std_error,
                }
            })
            .collect();

        let wresid = fit.whitened_residuals();
        let durbin_watson = durbin_watson(&wresid);
        let (skew, kurtosis) = skew_kurtosis(&wresid);
        let jarque_bera = n / 6.0 * (skew.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
        let chi2 = ChiSquared::new(2.0).map_err(|e| AppError::Fit(format!("chi-squared distribution: {e}")))?;
        let jarque_bera_p = upper_tail(&chi2, jarque_bera);

        Ok(Self {
            nobs,
            df_model,
            df_resid,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_p_value,
            log_likelihood,
            aic,
            bic,
            durbin_watson,
            jarque_bera,
            jarque_bera_p,
            skew,
            kurtosis,
            condition_number: fit.condition_number(),
            coefficients,
        })
    }
}

/// Survival function; NaN statistics (e.g. from a perfect fit) stay NaN.
fn upper_tail<D: ContinuousCDF<f64, f64>>(dist: &D, x: f64) -> f64 {
    if x.is_nan() { f64::NAN } else { dist.sf(x) }
}

fn durbin_watson(resid: &DVector<f64>) -> f64 {
    let num: f64 = resid.as_slice().windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    num / resid.norm_squared()
}

/// Sample skewness and (non-excess) kurtosis from central moments.
fn skew_kurtosis(resid: &DVector<f64>) -> (f64, f64) {
    let n = resid.len() as f64;
    let mean = resid.mean();
    let moment = |p: i32| resid.iter().map(|e| (e - mean).powi(p)).sum::<f64>() / n;
    let m2 = moment(2);
    (moment(3) / m2.powf(1.5), moment(4) / m2.powi(2))
}
