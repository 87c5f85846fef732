use std::collections::HashSet;

use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use serde_json::Value;

use crate::errors::ParseError;
use crate::model::{Record, TableSchema};

// 2^53, the largest magnitude where every integer has an exact f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredKind {
    Boolean,
    Integer,
    Float,
    Text,
}

impl InferredKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => InferredKind::Boolean,
            Value::Number(n) if n.as_i64().is_some() => InferredKind::Integer,
            Value::Number(_) => InferredKind::Float,
            _ => InferredKind::Text,
        }
    }

    fn merge(self, other: Self) -> Self {
        use InferredKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }
}

/// Builds a frame with one column per key, in first-appearance order.
///
/// Metric columns named by `schema` are coerced to numbers; every other
/// column gets the narrowest type that holds all of its values.
pub fn build_frame(records: &[Record], schema: &TableSchema) -> Result<DataFrame, ParseError> {
    if records.is_empty() {
        return Err(ParseError::EmptyDataset);
    }

    let names = column_order(records);
    let mut columns: Vec<Column> = Vec::with_capacity(names.len());

    for name in &names {
        let values: Vec<Option<&Value>> = records.iter().map(|r| r.get(name.as_str())).collect();
        let series = if schema.is_metric(name) {
            metric_series(name, &values)
        } else {
            inferred_series(name, &values)
        };
        columns.push(series.into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Converts a JSON value to a finite number, or `None` when it has no
/// numeric reading.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

fn column_order(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                order.push(key.clone());
            }
        }
    }
    order
}

fn metric_series(name: &str, values: &[Option<&Value>]) -> Series {
    let coerced: Vec<Option<f64>> = values
        .iter()
        .map(|value| value.and_then(coerce_numeric))
        .collect();

    let integral = coerced
        .iter()
        .flatten()
        .all(|v| v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER);

    if integral {
        let ints: Vec<Option<i64>> = coerced.iter().map(|v| v.map(|v| v as i64)).collect();
        Series::new(name.into(), ints)
    } else {
        Series::new(name.into(), coerced)
    }
}

fn inferred_series(name: &str, values: &[Option<&Value>]) -> Series {
    let present = values
        .iter()
        .flatten()
        .filter(|value| !value.is_null())
        .map(|value| InferredKind::of(value));
    let kind = present.reduce(InferredKind::merge).unwrap_or(InferredKind::Text);

    match kind {
        InferredKind::Boolean => {
            let data: Vec<Option<bool>> = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            Series::new(name.into(), data)
        }
        InferredKind::Integer => {
            let data: Vec<Option<i64>> = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            Series::new(name.into(), data)
        }
        InferredKind::Float => {
            let data: Vec<Option<f64>> = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            Series::new(name.into(), data)
        }
        InferredKind::Text => {
            let data: Vec<Option<String>> = values.iter().map(|v| v.and_then(render_text)).collect();
            Series::new(name.into(), data)
        }
    }
}

fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
