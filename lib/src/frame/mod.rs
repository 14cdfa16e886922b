//! Columnar dataset abstractions.
//!
//! This module provides the [`Dataset`] trait, the minimal structural contract
//! the column adapter needs, and [`DataFrame`], an in-memory implementation.
//!
//! # Core Concepts
//!
//! - **Column** - a vector of JSON scalars (`serde_json::Value`), one per row.
//! - **Handle** - an optional name identifying the frame as a plain reference.
//!   Column adapters with expression capture enabled only capture columns of
//!   frames that carry a handle.
//! - **Duplicates** - a frame may be built with repeated column names; the
//!   column adapter rejects such frames before touching them.
//!
//! # Example
//!
//! ```rust
//! use datastep::frame::{DataFrame, Dataset};
//! use serde_json::json;
//!
//! let frame = DataFrame::from_columns(vec![
//!     ("age", vec![json!(31), json!(47)]),
//!     ("city", vec![json!("Oslo"), json!("Lima")]),
//! ])
//! .unwrap();
//!
//! assert_eq!(frame.column_count(), 2);
//! assert_eq!(frame.get_column("age").unwrap()[1], json!(47));
//! ```

use crate::error::{Result, TransformError};
use serde_json::Value;
use std::collections::HashMap;

mod reader;

/// Values of a single column, one JSON scalar per row.
pub type Column = Vec<Value>;

/// Structural operations a dataset must support to be transformed column-wise.
///
/// Only `column_names`, `column_at` and `set_column_at` are required; the
/// name-based accessors have default implementations that implementors with
/// an index (like [`DataFrame`]) override to avoid linear scans.
pub trait Dataset {
    /// Column names in positional order. May contain duplicates.
    fn column_names(&self) -> &[String];

    /// Values of the column at `index`.
    fn column_at(&self, index: usize) -> Option<&[Value]>;

    /// Replace the values of the column at `index` in place.
    fn set_column_at(&mut self, index: usize, values: Column) -> Result<()>;

    /// Number of columns.
    fn column_count(&self) -> usize {
        self.column_names().len()
    }

    /// Position of the first column called `name`.
    fn position(&self, name: &str) -> Option<usize> {
        self.column_names().iter().position(|n| n == name)
    }

    /// Values of the first column called `name`.
    fn get_column(&self, name: &str) -> Option<&[Value]> {
        self.position(name).and_then(|i| self.column_at(i))
    }

    /// Replace the values of the first column called `name`.
    fn set_column(&mut self, name: &str, values: Column) -> Result<()> {
        match self.position(name) {
            Some(index) => self.set_column_at(index, values),
            None => Err(TransformError::MissingColumn(name.to_string())),
        }
    }

    /// Distinct column names occurring more than once, in order of first repeat.
    fn duplicate_names(&self) -> Vec<String> {
        find_duplicates(self.column_names())
    }

    /// Name under which this dataset was passed as a plain reference, if any.
    fn handle(&self) -> Option<&str> {
        None
    }
}

fn find_duplicates(names: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(names.len());
    let mut duplicates = Vec::new();
    for name in names {
        let count = seen.entry(name.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicates.push(name.clone());
        }
    }
    duplicates
}

/// In-memory columnar dataset.
///
/// Lookups by name are O(1): the frame keeps an index from name to the first
/// position carrying it, plus the list of duplicated names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrame {
    handle: Option<String>,
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
    index: HashMap<String, usize>,
    duplicates: Vec<String>,
}

impl DataFrame {
    /// Create an empty frame with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, values)` pairs.
    ///
    /// # Errors
    /// Returns [`TransformError::InvalidShape`] if the columns differ in length.
    pub fn from_columns<N: Into<String>>(columns: Vec<(N, Column)>) -> Result<Self> {
        let mut frame = Self::new();
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    /// Attach a handle, marking the frame as a plain named reference.
    pub fn named(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Drop the handle, e.g. after deriving a frame from another one.
    pub fn unnamed(mut self) -> Self {
        self.handle = None;
        self
    }

    /// Append a column. Duplicate names are accepted and recorded.
    pub fn push_column(&mut self, name: impl Into<String>, values: Column) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.n_rows = values.len();
        } else if values.len() != self.n_rows {
            return Err(TransformError::InvalidShape {
                column: name,
                expected: self.n_rows,
                got: values.len(),
            });
        }

        let position = self.names.len();
        if self.index.contains_key(&name) {
            if !self.duplicates.contains(&name) {
                self.duplicates.push(name.clone());
            }
        } else {
            self.index.insert(name.clone(), position);
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Iterate over `(name, values)` pairs in positional order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}

impl Dataset for DataFrame {
    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn column_at(&self, index: usize) -> Option<&[Value]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    fn set_column_at(&mut self, index: usize, values: Column) -> Result<()> {
        let Some(slot) = self.columns.get_mut(index) else {
            return Err(TransformError::MissingColumn(format!("#{}", index)));
        };
        if values.len() != self.n_rows {
            return Err(TransformError::InvalidShape {
                column: self.names[index].clone(),
                expected: self.n_rows,
                got: values.len(),
            });
        }
        *slot = values;
        Ok(())
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn duplicate_names(&self) -> Vec<String> {
        self.duplicates.clone()
    }

    fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }
}

/// Interpret a cell as a finite number.
///
/// Nulls, non-numeric cells and strings such as `"NaN"` or `"inf"` yield `None`.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame() -> DataFrame {
        DataFrame::from_columns(vec![
            ("a", vec![json!(1), json!(2)]),
            ("b", vec![json!("x"), json!("y")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_frame_creation() {
        let f = frame();
        assert_eq!(f.column_count(), 2);
        assert_eq!(f.n_rows(), 2);
        assert_eq!(f.column_names(), &["a".to_string(), "b".to_string()]);
        assert!(f.handle().is_none());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = DataFrame::from_columns(vec![
            ("a", vec![json!(1), json!(2)]),
            ("b", vec![json!(1)]),
        ]);
        assert!(matches!(
            result,
            Err(TransformError::InvalidShape {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_set_column_in_place() {
        let mut f = frame();
        f.set_column("b", vec![json!("p"), json!("q")]).unwrap();
        assert_eq!(f.get_column("b").unwrap(), &[json!("p"), json!("q")]);
        assert_eq!(f.column_names()[1], "b");
    }

    #[test]
    fn test_set_column_wrong_length() {
        let mut f = frame();
        let result = f.set_column_at(0, vec![json!(1)]);
        assert!(matches!(result, Err(TransformError::InvalidShape { .. })));
        assert_eq!(f.get_column("a").unwrap(), &[json!(1), json!(2)]);
    }

    #[test]
    fn test_set_missing_column() {
        let mut f = frame();
        let result = f.set_column("zzz", vec![json!(1), json!(2)]);
        assert!(matches!(result, Err(TransformError::MissingColumn(_))));
    }

    #[test]
    fn test_duplicates_tracked() {
        let f = DataFrame::from_columns(vec![
            ("a", vec![json!(1)]),
            ("a", vec![json!(2)]),
            ("b", vec![json!(3)]),
            ("a", vec![json!(4)]),
        ])
        .unwrap();
        assert_eq!(f.duplicate_names(), vec!["a".to_string()]);
        assert_eq!(f.position("a"), Some(0));
        assert_eq!(f.position("b"), Some(2));
    }

    #[test]
    fn test_default_duplicate_scan_matches_index() {
        let names: Vec<String> = ["x", "y", "x", "z", "y", "x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(find_duplicates(&names), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_named_handle() {
        let f = frame().named("train");
        assert_eq!(f.handle(), Some("train"));
        assert!(f.unnamed().handle().is_none());
    }

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(2)), Some(2.0));
        assert_eq!(as_number(&json!(2.5)), Some(2.5));
        assert_eq!(as_number(&json!(" 3 ")), Some(3.0));
        assert_eq!(as_number(&json!(null)), None);
        assert_eq!(as_number(&json!("abc")), None);
    }

    #[test]
    fn test_as_number_rejects_non_finite_strings() {
        for text in ["NaN", "nan", "inf", "-inf", "infinity", "-Infinity"] {
            assert_eq!(as_number(&json!(text)), None, "{}", text);
        }
    }
}
