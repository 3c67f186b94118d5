//! Command-line parsing for the standard linearity analysis.
//!
//! Parsing stays here; `app` turns the parsed flags into an `AnalysisConfig`.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::{FitMode, ImageFormat};

/// Top-level CLI.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "standard-linearity",
    version,
    about = "Fit a calibration line to a standard series and report its linearity"
)]
pub struct Cli {
    /// Delimited input file (CSV by default).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Figure format for `graphs.<format>`.
    #[arg(short = 'i', long, value_enum, ignore_case = true, default_value_t = ImageFormat::Svg)]
    pub image_format: ImageFormat,

    /// Fitting mode. WLS weights each standard by 1/c².
    #[arg(short = 'f', long, value_enum, ignore_case = true, default_value_t = FitMode::Ols)]
    pub fit_mode: FitMode,

    /// 0-based row holding the column names (blank lines are not counted).
    #[arg(short = 'H', long, default_value_t = 0)]
    pub header_row: usize,

    /// Read at most this many data rows after the header.
    #[arg(short = 'n', long)]
    pub max_rows: Option<usize>,

    /// Destination directory. Defaults to `<cwd>/<timestamp>_analysis`.
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// JSON file with plot directives.
    #[arg(short = 'p', long, value_name = "JSON")]
    pub plot_config: Option<PathBuf>,

    /// Name of the instrument response column (matched exactly).
    #[arg(short = 'r', long, value_name = "NAME")]
    pub response_column: String,

    /// Name of the standard concentration column (matched exactly).
    #[arg(short = 's', long, value_name = "NAME")]
    pub standards_column: String,

    /// Drop this many leading data rows after the header.
    #[arg(long)]
    pub skip_rows: Option<usize>,

    /// Single-byte field delimiter.
    #[arg(short = 'd', long, default_value = ",", value_parser = parse_delimiter)]
    pub delimiter: u8,
}

fn parse_delimiter(raw: &str) -> Result<u8, String> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match raw.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(format!("delimiter must be a single ASCII character, got '{raw}'")),
        },
    }
}
