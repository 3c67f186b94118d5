//! Formatted text output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use chrono::{DateTime, TimeZone};

use crate::domain::{FitMode, STANDARDS_COLUMN};
use crate::fit::FittedModel;
use crate::report::LinearityParameters;

const WIDTH: usize = 78;
/// Width of a label column in the two-column header blocks.
const HALF: usize = 39;

/// Regression table in the layout of common statistics packages.
pub fn format_model_summary<Tz>(model: &FittedModel, generated: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stats = model.statistics();
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let mut out = String::new();

    let title = format!("{} Regression Results", model.mode());
    out.push_str(&format!("{title:^width$}\n", width = WIDTH));
    out.push_str(&heavy);
    out.push('\n');

    let left = [
        ("Dep. Variable:", STANDARDS_COLUMN.to_string()),
        ("Model:", model.mode().to_string()),
        ("Method:", "Least Squares".to_string()),
        ("Date:", generated.format("%a, %d %b %Y").to_string()),
        ("Time:", generated.format("%H:%M:%S").to_string()),
        ("No. Observations:", stats.nobs.to_string()),
        ("Df Residuals:", stats.df_resid.to_string()),
        ("Df Model:", stats.df_model.to_string()),
    ];
    let right = [
        ("R-squared:", fmt_stat(stats.r_squared)),
        ("Adj. R-squared:", fmt_stat(stats.adj_r_squared)),
        ("F-statistic:", fmt_stat(stats.f_statistic)),
        ("Prob (F-statistic):", fmt_stat(stats.f_p_value)),
        ("Log-Likelihood:", fmt_stat(stats.log_likelihood)),
        ("AIC:", fmt_stat(stats.aic)),
        ("BIC:", fmt_stat(stats.bic)),
        ("", String::new()),
    ];
    push_two_columns(&mut out, &left, &right);

    out.push_str(&heavy);
    out.push('\n');
    out.push_str(&format!(
        "{:<14}{:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
    ));
    out.push_str(&light);
    out.push('\n');
    for row in &stats.coefficients {
        out.push_str(&format!(
            "{:<14}{:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            row.name,
            fmt_stat(row.estimate),
            fmt_stat(row.std_error),
            fmt_stat(row.t_value),
            fmt_stat(row.p_value),
            fmt_stat(row.ci_lower),
            fmt_stat(row.ci_upper),
        ));
    }

    out.push_str(&heavy);
    out.push('\n');
    let left = [
        ("Durbin-Watson:", fmt_stat(stats.durbin_watson)),
        ("Prob(JB):", fmt_stat(stats.jarque_bera_p)),
        ("Kurtosis:", fmt_stat(stats.kurtosis)),
    ];
    let right = [
        ("Jarque-Bera (JB):", fmt_stat(stats.jarque_bera)),
        ("Skew:", fmt_stat(stats.skew)),
        ("Cond. No.", fmt_stat(stats.condition_number)),
    ];
    push_two_columns(&mut out, &left, &right);
    out.push_str(&heavy);
    out.push('\n');

    if model.mode() == FitMode::Wls {
        out.push_str("\nNotes:\n");
        out.push_str("[1] Weights are (1 / standard_concentrations)^2.\n");
        out.push_str("[2] Studentised residuals come from an OLS fit on the whitened data.\n");
    }

    out
}

/// Contents of `linearity_parameters.txt`.
///
/// Uses shortest round-trip float formatting, so identical inputs always
/// produce identical text.
pub fn format_linearity_parameters(params: &LinearityParameters) -> String {
    let rows = [
        ("Max absolute studentised residual:", params.max_abs_studentized_residual),
        ("Max % relative error:", params.max_relative_error),
        ("Min concentration:", params.min_concentration),
        ("Max concentration:", params.max_concentration),
    ];
    rows.iter()
        .map(|(label, value)| format!("{label:<35} {value}\n"))
        .collect()
}

fn push_two_columns(out: &mut String, left: &[(&str, String)], right: &[(&str, String)]) {
    for ((l_label, l_value), (r_label, r_value)) in left.iter().zip(right) {
        let l_pad = HALF.saturating_sub(l_label.len());
        let r_pad = (WIDTH - HALF - 1).saturating_sub(r_label.len());
        let line = format!("{l_label}{l_value:>l_pad$} {r_label}{r_value:>r_pad$}");
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

fn fmt_stat(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e4).contains(&a) {
        format!("{v:.3e}")
    } else {
        format!("{v:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalibrationDataset, CalibrationPoint};
    use crate::fit::fit;
    use chrono::{TimeZone, Utc};

    fn model(mode: FitMode) -> FittedModel {
        let pairs = [
            (0.5, 130.0),
            (1.0, 262.0),
            (2.0, 540.0),
            (4.0, 1010.0),
            (8.0, 2070.0),
            (16.0, 3950.0),
        ];
        let ds = CalibrationDataset::new(
            pairs
                .iter()
                .map(|&(concentration, response)| CalibrationPoint {
                    concentration,
                    response,
                })
                .collect(),
        )
        .unwrap();
        fit(&ds, mode).unwrap()
    }

    #[test]
    fn summary_lists_model_and_coefficients() {
        let at = Utc.with_ymd_and_hms(2026, 3, 25, 19, 1, 53).unwrap();
        let text = format_model_summary(&model(FitMode::Ols), &at);

        assert!(text.contains("OLS Regression Results"));
        assert!(text.contains("Dep. Variable:"));
        assert!(text.contains("standard_concentrations"));
        assert!(text.contains("Wed, 25 Mar 2026"));
        assert!(text.contains("19:01:53"));
        assert!(text.lines().any(|l| l.starts_with("Intercept")));
        assert!(text.lines().any(|l| l.starts_with("response")));
        assert!(text.contains("Durbin-Watson:"));
        assert!(!text.contains("Notes:"));
    }

    #[test]
    fn wls_summary_notes_weighting() {
        let at = Utc.with_ymd_and_hms(2026, 3, 25, 0, 0, 0).unwrap();
        let text = format_model_summary(&model(FitMode::Wls), &at);
        assert!(text.contains("WLS Regression Results"));
        assert!(text.contains("(1 / standard_concentrations)^2"));
    }

    #[test]
    fn linearity_parameters_layout() {
        let params = LinearityParameters {
            max_abs_studentized_residual: 2.25,
            max_relative_error: 12.5,
            min_concentration: 0.5,
            max_concentration: 16.0,
            residual_outliers: 1,
            caution_errors: 0,
            failed_errors: 0,
        };
        let text = format_linearity_parameters(&params);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("{:<35} 2.25", "Max absolute studentised residual:"));
        assert_eq!(lines[1], format!("{:<35} 12.5", "Max % relative error:"));
        assert_eq!(lines[2], format!("{:<35} 0.5", "Min concentration:"));
        assert_eq!(lines[3], format!("{:<35} 16", "Max concentration:"));
    }

    #[test]
    fn stat_formatting_switches_to_scientific() {
        assert_eq!(fmt_stat(0.5), "0.5000");
        assert_eq!(fmt_stat(12344.0), "1.234e4");
        assert_eq!(fmt_stat(0.0), "0.0000");
        assert_eq!(fmt_stat(f64::NAN), "NaN");
    }
}
