//! CSV loading for [`DataFrame`].

use super::{Column, DataFrame};
use crate::error::Result;
use ::csv::ReaderBuilder;
use serde_json::{Number, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

impl DataFrame {
    /// Load a frame from CSV with a header row.
    ///
    /// Empty fields become `null`; integers, floats and `true`/`false` are
    /// parsed, everything else is kept as a string.
    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().delimiter(delimiter).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut columns: Vec<Column> = vec![Vec::new(); headers.len()];
        for result in rdr.records() {
            let record = result?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.push(parse_field(field));
            }
        }

        DataFrame::from_columns(headers.into_iter().zip(columns).collect())
    }

    /// Load a comma-separated file; the file stem becomes the frame handle.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let frame = Self::from_csv_reader(BufReader::new(file), b',')?;
        Ok(match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => frame.named(stem),
            None => frame,
        })
    }
}

fn parse_field(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(field.to_string()),
    }
}
