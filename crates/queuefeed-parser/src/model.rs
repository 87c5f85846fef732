// crates/queuefeed-parser/src/model.rs

use polars::prelude::DataFrame;
use serde::Serialize;
use serde_json::{Map, Value};

/// One row of the source document, keyed by column name.
pub type Record = Map<String, Value>;

/// Columns that must be numeric and present for a row to be published.
pub const DEFAULT_METRIC_COLUMNS: [&str; 12] = [
    "validators",
    "entry_queue",
    "entry_wait",
    "exit_queue",
    "exit_wait",
    "churn",
    "entry_churn",
    "exit_churn",
    "supply",
    "staked_amount",
    "staked_percent",
    "apr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub metric_columns: Vec<String>,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            metric_columns: DEFAULT_METRIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TableSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric_columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_metric(&self, column: &str) -> bool {
        self.metric_columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CleanReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_dropped: usize,
    pub metric_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub df: DataFrame,
    pub report: CleanReport,
}
