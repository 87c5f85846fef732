use std::io::Cursor;

use polars::prelude::{CsvWriter, DataFrame, SerWriter};

use crate::errors::ParseError;

/// Serializes the frame as comma-separated text with a header row.
pub fn encode_csv(df: &DataFrame) -> Result<String, ParseError> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let mut clone = df.clone();
        CsvWriter::new(&mut cursor)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut clone)?;
    }

    String::from_utf8(buffer).map_err(|err| ParseError::Encoding(err.to_string()))
}
