//! Calibration model fitting.
//!
//! Responsibilities:
//!
//! - build the `concentration ~ response` design matrix
//! - run OLS, or the two-step WLS procedure
//! - derive summary statistics for the model summary report

pub mod fitter;
pub mod statistics;

pub use fitter::*;
pub use statistics::*;
