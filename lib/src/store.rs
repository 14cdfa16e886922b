//! Per-unit memory written during training and frozen afterwards.
//!
//! An [`InputStore`] is an ordered JSON object. While a unit trains, its
//! train function may insert and overwrite keys; once training succeeds the
//! unit freezes the store and every further write fails with
//! [`StateError::Frozen`].
//!
//! Stores produced by a column adapter follow a fixed layout:
//!
//! ```text
//! {
//!   "_columns": ["age", "income"],      // columns touched at training time
//!   "age":      { "mean": 39.5, ... },  // private memory of each column
//!   "income":   { "mean": 51200, ... }
//! }
//! ```
//!
//! Cell functions see their column's private memory through [`CellMemory`],
//! which is writable during training and a read-only view during prediction.

use crate::error::{Result, StateError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the column adapter records the columns it trained on.
pub const COLUMNS_KEY: &str = "_columns";

/// Ordered key/value memory with a write guard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputStore {
    entries: Map<String, Value>,
    #[serde(default)]
    frozen: bool,
}

impl InputStore {
    /// Create an empty, writable store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writable store holding `entries`.
    pub fn from_map(entries: Map<String, Value>) -> Self {
        Self {
            entries,
            frozen: false,
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a key and deserialize it into `T`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        deserialize_entry(&self.entries, key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite a key, returning the previous value.
    ///
    /// # Errors
    /// [`StateError::Frozen`] once the store has been frozen, or a
    /// serialization error if `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<Option<Value>> {
        let key = key.into();
        if self.frozen {
            return Err(StateError::Frozen { key }.into());
        }
        let value = serde_json::to_value(value)?;
        Ok(self.entries.insert(key, value))
    }

    /// Remove a key, returning its value.
    ///
    /// # Errors
    /// [`StateError::Frozen`] once the store has been frozen.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        if self.frozen {
            return Err(StateError::Frozen {
                key: key.to_string(),
            }
            .into());
        }
        Ok(self.entries.remove(key))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether writes are refused.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Plain copy of the current contents, detached from the store.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.clone()
    }

    /// Consume the store, returning its contents.
    pub fn into_map(self) -> Map<String, Value> {
        self.entries
    }

    /// Columns recorded by a column adapter at training time.
    pub fn columns(&self) -> Option<Vec<String>> {
        let list = self.entries.get(COLUMNS_KEY)?.as_array()?;
        list.iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Private memory recorded for `column` by a column adapter.
    pub fn column_memory(&self, column: &str) -> Option<&Map<String, Value>> {
        self.entries.get(column)?.as_object()
    }
}

fn deserialize_entry<T: DeserializeOwned>(entries: &Map<String, Value>, key: &str) -> Result<Option<T>> {
    match entries.get(key) {
        Some(value) => Ok(Some(T::deserialize(value)?)),
        None => Ok(None),
    }
}

/// A column's private memory as seen by a cell function.
///
/// During training this is a fresh writable store; during prediction it is a
/// read-only view of what training recorded, and writes fail.
#[derive(Debug)]
pub enum CellMemory<'a> {
    /// Writable memory, populated during training.
    Open(&'a mut InputStore),
    /// Memory recorded at training time.
    Frozen(&'a Map<String, Value>),
}

impl CellMemory<'_> {
    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            CellMemory::Open(store) => store.get(key),
            CellMemory::Frozen(map) => map.get(key),
        }
    }

    /// Look up a key and deserialize it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self {
            CellMemory::Open(store) => store.get_as(key),
            CellMemory::Frozen(map) => deserialize_entry(map, key),
        }
    }

    /// Look up a key that training must have recorded.
    ///
    /// # Errors
    /// [`crate::TransformError::Configuration`] when the key is missing.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_as(key)?.ok_or_else(|| {
            crate::error::TransformError::Configuration(format!(
                "column memory has no entry '{}'",
                key
            ))
        })
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite a key.
    ///
    /// # Errors
    /// [`StateError::Frozen`] during prediction.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<Option<Value>> {
        match self {
            CellMemory::Open(store) => store.insert(key, value),
            CellMemory::Frozen(_) => Err(StateError::Frozen { key: key.into() }.into()),
        }
    }

    /// Whether writes are refused.
    pub fn is_frozen(&self) -> bool {
        match self {
            CellMemory::Open(store) => store.is_frozen(),
            CellMemory::Frozen(_) => true,
        }
    }
}
