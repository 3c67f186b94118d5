//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - plot configuration files (`plot_config`)
//! - artifact export (`export`)

pub mod export;
pub mod ingest;
pub mod plot_config;

pub use export::*;
pub use ingest::*;
pub use plot_config::*;
