//! `standard-linearity` library crate.
//!
//! The binary is a thin wrapper around this library so that the import, fit
//! and export stages are testable without spawning processes.

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
