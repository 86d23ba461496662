use std::path::PathBuf;

use thiserror::Error;

use crate::graph::validate::ValidationReport;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required column `{column}` in {}", file.display())]
    MissingColumn {
        column: &'static str,
        file: PathBuf,
    },
    #[error("invalid value in column `{column}` of {}: {message}", file.display())]
    InvalidField {
        column: &'static str,
        file: PathBuf,
        message: String,
    },
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("graph validation failed: {0}")]
    ValidationFailed(ValidationReport),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
