//! Error taxonomy for the analytics pipeline

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// A required field is absent or cannot be parsed.
    #[error("record {record}: field '{field}' {reason}")]
    Parse {
        record: usize,
        field: &'static str,
        reason: String,
    },

    #[error("required column '{0}' is missing from the input")]
    MissingColumn(String),

    #[error("no transactions to analyse")]
    EmptyInput,

    #[error("cannot form {requested} clusters from {available} accounts")]
    InsufficientData { requested: usize, available: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("feature '{feature}' has no values to impute from")]
    UndefinedFeature { feature: &'static str },

    #[error("clustering failed: {0}")]
    Clustering(String),

    /// The CSV itself is structurally malformed (ragged rows, bad quoting).
    #[error("malformed CSV: {0}")]
    Csv(PolarsError),

    #[error(transparent)]
    Frame(#[from] PolarsError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// True for malformed or missing input fields, whichever way they surfaced.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::MissingColumn(_) | Self::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
