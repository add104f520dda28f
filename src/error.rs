//! Crate-wide error type.
//!
//! Every variant maps to a process exit code so that `main` can stay tiny:
//!
//! - `2`: bad input (unreadable/malformed files, bad arguments, bad config)
//! - `3`: data preconditions (missing sample metadata, empty selections)
//! - `4`: numerical/internal failures

use std::path::PathBuf;

use thiserror::Error;

use crate::fit::{FitError, SubtractError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed file '{}' (line {line}): {message}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Measurement '{measurement}' has no {field} set; cannot compute the requested quantity.")]
    MissingMetadata {
        measurement: String,
        field: &'static str,
    },

    #[error("Measurement '{measurement}' has an invalid {field} value '{value}'.")]
    InvalidMetadata {
        measurement: String,
        field: &'static str,
        value: String,
    },

    #[error("Datapoint index {index} is out of range (measurement has {len} datapoints).")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Fitting failed: {0}")]
    Fit(#[from] FitError),

    #[error("Background subtraction failed: {0}")]
    Subtract(#[from] SubtractError),

    #[error("Failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid curve JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        AppError::Malformed {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Io { .. }
            | AppError::Malformed { .. }
            | AppError::InvalidArgument(_)
            | AppError::Config(_)
            | AppError::Json(_) => 2,
            AppError::MissingMetadata { .. }
            | AppError::InvalidMetadata { .. }
            | AppError::IndexOutOfRange { .. } => 3,
            AppError::Fit(_) | AppError::Subtract(_) | AppError::Csv(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_names_file_and_line() {
        let err = AppError::malformed("scans/a.rw.dat", 17, "missing key 'slope'");
        let msg = err.to_string();
        assert!(msg.contains("scans/a.rw.dat"), "{msg}");
        assert!(msg.contains("line 17"), "{msg}");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_metadata_is_a_precondition_failure() {
        let err = AppError::MissingMetadata {
            measurement: "M1.rw.dat".to_string(),
            field: "sample density",
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("sample density"));
    }
}
