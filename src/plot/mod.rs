//! Diagnostic figure: plot configuration directives and Plotters rendering.

pub mod config;
pub mod figure;

pub use config::*;
pub use figure::*;
