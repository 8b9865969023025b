use thiserror::Error;

/// Expected columns absent from a loaded table. Fatal for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Schema validation failed, missing columns: {}", missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// Failure inside the cleaning sequence. No partial cleaned table is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CleaningError {
    #[error("Column '{0}' is required for cleaning but is not present")]
    MissingColumn(String),

    #[error("Non-numeric value '{value}' in column '{column}' at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
}

/// Failure computing a single summary table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("{summary}: column '{column}' is not present")]
    MissingColumn { summary: String, column: String },

    #[error("{summary}: non-numeric value '{value}' in column '{column}' at row {row}")]
    NonNumeric {
        summary: String,
        column: String,
        row: usize,
        value: String,
    },
}

/// Every summary that failed during one gold-stage run.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} aggregation(s) failed: {}", failures.len(), describe(failures))]
pub struct AggregationFailures {
    pub failures: Vec<AggregationError>,
}

fn describe(failures: &[AggregationError]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Cleaning failed: {0}")]
    Cleaning(#[from] CleaningError),

    #[error(transparent)]
    Aggregation(#[from] AggregationFailures),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported artifact layout: {0}")]
    Artifact(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
