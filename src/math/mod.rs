//! Numerical utilities: weighted least squares and influence diagnostics.

pub mod ols;

pub use ols::*;
