use serde_json::{Map, Value};

use crate::errors::ParseError;
use crate::model::Record;

/// Parses a source document into records.
///
/// Two shapes are accepted: an array of objects (one object per row), or an
/// object whose values are equal-length arrays (one array per column).
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>, ParseError> {
    let document: Value = serde_json::from_slice(bytes)?;

    match document {
        Value::Array(rows) => rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| match row {
                Value::Object(map) => Ok(map),
                _ => Err(ParseError::NotAnObject { index }),
            })
            .collect(),
        Value::Object(columns) => columns_to_records(columns),
        other => Err(ParseError::UnsupportedShape(format!(
            "expected an array of objects or an object of arrays, found {}",
            kind_name(&other)
        ))),
    }
}

fn columns_to_records(columns: Map<String, Value>) -> Result<Vec<Record>, ParseError> {
    let mut expected: Option<usize> = None;
    let mut arrays = Vec::with_capacity(columns.len());

    for (name, value) in columns {
        let Value::Array(values) = value else {
            return Err(ParseError::UnsupportedShape(format!(
                "column {name} is {}, expected an array",
                kind_name(&value)
            )));
        };

        match expected {
            None => expected = Some(values.len()),
            Some(len) if len != values.len() => {
                return Err(ParseError::LengthMismatch {
                    column: name,
                    expected: len,
                    found: values.len(),
                });
            }
            Some(_) => {}
        }

        arrays.push((name, values));
    }

    let rows = expected.unwrap_or(0);
    let mut records: Vec<Record> = (0..rows).map(|_| Map::new()).collect();
    for (name, values) in arrays {
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.clone(), value);
        }
    }

    Ok(records)
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
