// crates/queuefeed-parser/src/errors.rs

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("source document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported document shape: {0}")]
    UnsupportedShape(String),

    #[error("column {column} has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("source document did not contain any records")]
    EmptyDataset,

    #[error("metric columns missing from dataset: {columns:?}")]
    MissingColumns { columns: Vec<String> },

    #[error("no rows left after dropping {dropped} incomplete rows")]
    NoCompleteRows { dropped: usize },

    #[error("CSV encoding failed: {0}")]
    Encoding(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}
