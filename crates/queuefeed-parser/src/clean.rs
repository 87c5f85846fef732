use polars::prelude::{BooleanChunked, DataFrame};
use tracing::{info, warn};

use crate::errors::ParseError;
use crate::model::{CleanReport, CleanedTable, TableSchema};

/// Drops every row with a null in any metric column.
///
/// All metric columns must be present; each missing one is logged before the
/// call fails so a single run reports the full list.
pub fn clean_frame(df: &DataFrame, schema: &TableSchema) -> Result<CleanedTable, ParseError> {
    let missing: Vec<String> = schema
        .metric_columns
        .iter()
        .filter(|name| df.column(name.as_str()).is_err())
        .cloned()
        .collect();

    for name in &missing {
        warn!(column = %name, "metric column not found in dataset");
    }
    if !missing.is_empty() {
        return Err(ParseError::MissingColumns { columns: missing });
    }

    let mut mask: Option<BooleanChunked> = None;
    for name in &schema.metric_columns {
        let present = df.column(name.as_str())?.is_not_null();
        mask = Some(match mask {
            Some(acc) => &acc & &present,
            None => present,
        });
    }

    let rows_before = df.height();
    let cleaned = match mask {
        Some(mask) => df.filter(&mask)?,
        None => df.clone(),
    };
    let rows_after = cleaned.height();
    let rows_dropped = rows_before - rows_after;

    info!(
        rows_before,
        rows_after,
        rows_dropped,
        "dropped rows with missing metric values"
    );

    if rows_after == 0 {
        return Err(ParseError::NoCompleteRows {
            dropped: rows_dropped,
        });
    }

    Ok(CleanedTable {
        df: cleaned,
        report: CleanReport {
            rows_before,
            rows_after,
            rows_dropped,
            metric_columns: schema.metric_columns.clone(),
        },
    })
}
