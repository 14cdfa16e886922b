//! Call parameters passed to transform and cell functions.

use crate::error::Result;
use crate::selector::ColumnSpec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Arguments of a single `run`/`train`/`predict` call.
///
/// Carries the column specification consumed by column adapters plus any
/// number of named extra arguments forwarded to the cell function.
///
/// # Example
/// ```rust
/// use datastep::{ColumnSpec, Params};
///
/// let params = Params::new()
///     .columns(ColumnSpec::names(["age", "income"]))
///     .arg("factor", 2.0);
///
/// assert_eq!(params.get_f64("factor"), Some(2.0));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Params {
    columns: Option<ColumnSpec>,
    args: Map<String, Value>,
}

impl Params {
    /// No column specification and no extra arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the column specification.
    pub fn columns(mut self, spec: ColumnSpec) -> Self {
        self.columns = Some(spec);
        self
    }

    /// Add a named extra argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Add a named extra argument from any serializable value.
    ///
    /// # Errors
    /// [`TransformError::Serialization`](crate::TransformError::Serialization)
    /// if `value` has no JSON representation, e.g. a map with non-string keys.
    pub fn try_arg<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        self.args.insert(key.into(), value);
        Ok(self)
    }

    /// The column specification, if one was given.
    pub fn column_spec(&self) -> Option<&ColumnSpec> {
        self.columns.as_ref()
    }

    /// Raw value of a named argument.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// Numeric value of a named argument.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.args.get(key).and_then(Value::as_f64)
    }

    /// Deserialize a named argument into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.args.get(key) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    /// All named arguments.
    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }
}
