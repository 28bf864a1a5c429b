// Error type shared by every pipeline stage.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("row {line} of {table} has {found} fields, header has {expected}")]
    MalformedRow {
        table: String,
        line: usize,
        found: usize,
        expected: usize,
    },

    #[error("non-numeric value '{value}' for {country} / {indicator} in column {column}")]
    InvalidValue {
        country: String,
        indicator: String,
        column: String,
        value: String,
    },

    #[error("year column '{0}' is not a valid integer year")]
    InvalidYear(String),

    #[error("invalid value '{value}' in column '{column}' of {table}, data row {row}")]
    InvalidCell {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    #[error("no usable CO2 indicator found; looked for {candidates:?}")]
    NoCo2Indicator { candidates: Vec<&'static str> },

    #[error("duplicate observation for {country_code} / {indicator_code} / {year}")]
    DuplicateKey {
        country_code: String,
        indicator_code: String,
        year: i32,
    },

    #[error("value column '{0}' missing from panel")]
    MissingValueColumn(String),

    #[error("expected CO2 column '{0}' missing from panel")]
    MissingCo2Column(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
