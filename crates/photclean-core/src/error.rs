// crates/photclean-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanseError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config render error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required column {column} is missing")]
    MissingColumn { column: String },

    #[error("column {column} contains {count} null values")]
    NullValues { column: String, count: usize },

    #[error("invalid source id {source_id}; ids must be positive")]
    InvalidSourceId { source_id: i64 },

    #[error("column length mismatch for {column}: expected {expected}, found {found}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate {kind} key {key}")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("invalid {kind} key {key}")]
    InvalidKey { kind: &'static str, key: String },

    #[error("column {column} holds {value}, which is not a whole number")]
    NonIntegerValue { column: String, value: f64 },

    #[error("{band} counts for source {source_id} overflow")]
    CountOverflow { source_id: i64, band: &'static str },

    #[error("{column} ratio {ratio} at {key} lies outside [0, 1]")]
    RatioOutOfRange {
        column: String,
        key: String,
        ratio: f64,
    },

    #[error("negative {column} count {count} for source {source_id}")]
    NegativeCount {
        column: String,
        source_id: i64,
        count: i64,
    },

    #[error("{stage} threshold {threshold} is invalid: {reason}")]
    InvalidThreshold {
        stage: &'static str,
        threshold: f64,
        reason: &'static str,
    },

    #[error("invalid sentinel policy: {0}")]
    InvalidPolicy(String),

    #[error("{stage} stage requires {input}, which was not supplied")]
    MissingInput {
        stage: &'static str,
        input: &'static str,
    },

    #[error("{stage} changed the row count from {expected} to {found}")]
    RowCountChanged {
        stage: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unsupported table format for {path}; expected .csv or .parquet")]
    UnsupportedFormat { path: String },
}

pub type Result<T> = std::result::Result<T, CleanseError>;
