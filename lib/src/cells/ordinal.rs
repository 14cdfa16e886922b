//! Ordinal encoding for categorical columns.
//!
//! Maps each category to its position in the sorted list of categories seen
//! at training time (0, 1, 2, ...).

use crate::adapter::CellFn;
use crate::error::{Result, TransformError};
use crate::frame::{Column, Dataset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

/// Strategy for handling unknown categories after training.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Fail the call when an unknown category is encountered.
    Error,
    /// Encode unknown categories as null.
    #[default]
    Ignore,
}

/// Cell that ordinal-encodes a column; unknown categories become null.
pub fn ordinal_encode<D: Dataset>() -> CellFn<D> {
    ordinal_encode_with(HandleUnknown::Ignore)
}

/// Cell that ordinal-encodes a column with explicit unknown handling.
///
/// Non-string values are encoded through their JSON text, so `1` and `"1"`
/// share a category. Nulls always encode as null.
pub fn ordinal_encode_with<D: Dataset>(handle_unknown: HandleUnknown) -> CellFn<D> {
    CellFn::named(move |input, name, ctx, _params| {
        let values = input.values();
        if !ctx.trained() {
            let categories: BTreeSet<String> = values.iter().filter_map(category).collect();
            ctx.memory_mut().insert("categories", &categories)?;
        }
        let categories: Vec<String> = ctx.memory().require("categories")?;
        encode(values, name, &categories, handle_unknown)
    })
}

fn category(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn encode(values: &[Value], name: &str, categories: &[String], handle_unknown: HandleUnknown) -> Result<Column> {
    let lookup: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    values
        .iter()
        .map(|value| {
            let Some(key) = category(value) else {
                return Ok(Value::Null);
            };
            match (lookup.get(key.as_str()), handle_unknown) {
                (Some(&ordinal), _) => Ok(json!(ordinal)),
                (None, HandleUnknown::Ignore) => Ok(Value::Null),
                (None, HandleUnknown::Error) => Err(TransformError::cell(format!(
                    "column '{}': unknown category '{}'",
                    name, key
                ))),
            }
        })
        .collect()
}
