//! Application error type.
//!
//! Every failure is terminal for a run, so there is a single error enum. Each
//! variant maps to a process exit code through [`AppError::exit_code`].

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A requested column is missing from the cleaned input table.
    #[error(
        "Column `{column}` ({role}) not found in input; check the `--response-column` and `--standards-column` values. Available columns: {available}"
    )]
    ColumnNotFound {
        column: String,
        role: &'static str,
        available: String,
    },

    /// Malformed or unusable input data.
    #[error("{0}")]
    Input(String),

    /// Invalid plot configuration or command-line configuration.
    #[error("{0}")]
    Config(String),

    /// Numerical failure while fitting or deriving diagnostics.
    #[error("Fit failed: {0}")]
    Fit(String),

    #[error("{context} '{}': {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Figure rendering failed.
    #[error("Failed to render figure: {0}")]
    Render(String),
}

impl AppError {
    pub fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::ColumnNotFound { .. } | AppError::Input(_) | AppError::Config(_) => 2,
            AppError::Fit(_) => 3,
            AppError::Io { .. } | AppError::Render(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let missing = AppError::ColumnNotFound {
            column: "Std".to_string(),
            role: "standard concentrations",
            available: "A, B".to_string(),
        };
        assert_eq!(missing.exit_code(), 2);
        assert_eq!(AppError::Fit("singular".into()).exit_code(), 3);

        let io = AppError::io(
            "Failed to create",
            Path::new("/nope"),
            std::io::Error::other("denied"),
        );
        assert_eq!(io.exit_code(), 4);
        assert!(io.to_string().contains("/nope"));
    }

    #[test]
    fn column_error_names_column_and_role() {
        let err = AppError::ColumnNotFound {
            column: "Std".to_string(),
            role: "standard concentrations",
            available: "A, B".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`Std`"));
        assert!(msg.contains("standard concentrations"));
    }
}
