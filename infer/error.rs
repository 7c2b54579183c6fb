use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the crate can surface. A proxy value that is absent from its
/// table is deliberately not represented here: it yields an undefined row.
#[derive(Error, Debug)]
pub enum BifsgError {
    #[error(
        "Input length mismatch. First name length: {}. Surname length: {surnames}. Geography length: {geography_codes}.",
        .first_names.map_or_else(|| "n/a".to_string(), |n| n.to_string())
    )]
    InputLengthMismatch {
        first_names: Option<usize>,
        surnames: usize,
        geography_codes: usize,
    },

    #[error("Unknown geography resolution '{0}'. Expected one of 'ZCTA', 'TRACT', 'BLOCK'.")]
    UnknownResolution(String),

    #[error(
        "No block partition is stored for state code(s) {missing:?} (requested: {requested:?})."
    )]
    MissingPartition {
        requested: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Model configuration error: {0}")]
    ModelMismatch(String),

    #[error("Invalid probability table '{table}': {reason}")]
    InvalidTable { table: String, reason: String },

    #[error("Invalid raw extract '{}': {reason}", .path.display())]
    InvalidExtract { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),

    #[error("Could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl BifsgError {
    pub(crate) fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        BifsgError::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_extract(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BifsgError::InvalidExtract {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
