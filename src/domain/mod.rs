//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - run configuration enums (`FitMode`, `ImageFormat`) and `AnalysisConfig`
//! - the cleaned calibration data (`CalibrationDataset`)
//! - per-row diagnostics (`DiagnosticsResult`)

pub mod types;

pub use types::*;
