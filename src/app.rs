//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initialises logging
//! - parses CLI arguments
//! - runs the analysis pipeline
//! - prints where the artifacts went

use chrono::Local;
use clap::Parser;

use crate::cli::Cli;
use crate::domain::AnalysisConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `standard-linearity` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = analysis_config_from_args(&cli);

    let base_dir = std::env::current_dir()
        .map_err(|e| AppError::io("Failed to resolve working directory", std::path::Path::new("."), e))?;
    let run = pipeline::run_analysis(&config, &base_dir, Local::now())?;

    let params = &run.export.parameters;
    println!("Analysis written to {}", run.export.directory.display());
    println!("  fit mode:                          {}", run.model.mode());
    println!("  max |studentised residual|:        {}", params.max_abs_studentized_residual);
    println!("  max % relative error:              {}", params.max_relative_error);
    println!(
        "  concentration range:               {} .. {}",
        params.min_concentration, params.max_concentration
    );

    Ok(())
}

pub fn analysis_config_from_args(cli: &Cli) -> AnalysisConfig {
    AnalysisConfig {
        input_path: cli.input.clone(),
        response_column: cli.response_column.clone(),
        standards_column: cli.standards_column.clone(),
        header_row: cli.header_row,
        max_rows: cli.max_rows,
        skip_rows: cli.skip_rows,
        delimiter: cli.delimiter,
        fit_mode: cli.fit_mode,
        image_format: cli.image_format,
        output_dir: cli.output_dir.clone(),
        plot_config: cli.plot_config.clone(),
    }
}
