//! Named transform functions and persisted unit state.
//!
//! Closures cannot be serialized, so a unit is saved as its trained flag,
//! configuration, store and the *names* of its functions. Loading resolves
//! those names against a [`FunctionRegistry`] populated by the application.
//!
//! # Example
//! ```ignore
//! let mut registry = FunctionRegistry::new();
//! registry.register("standardize", make_column_transformation(standardize(), false));
//!
//! let mut unit = TransformUnit::from_registry(&registry, Some("standardize"), None, UnitConfig::default())?;
//! unit.run(&mut train, &params)?;
//! unit.save_to_file("standardize.json")?;
//!
//! // Later, for inference:
//! let mut loaded = TransformUnit::load_from_file("standardize.json", &registry)?;
//! loaded.run(&mut test, &Params::new())?;
//! ```

use super::{TransformFn, TransformUnit, UnitConfig, UnitContext};
use crate::error::{Result, TransformError};
use crate::frame::Dataset;
use crate::params::Params;
use crate::store::InputStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Lookup table from names to transform functions.
pub struct FunctionRegistry<D> {
    functions: HashMap<String, TransformFn<D>>,
}

impl<D> Default for FunctionRegistry<D> {
    fn default() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }
}

impl<D> FunctionRegistry<D> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any previous entry.
    ///
    /// The stored function carries `name`, so units built from it can be
    /// persisted.
    pub fn register(&mut self, name: impl Into<String>, f: TransformFn<D>) -> &mut Self {
        let name = name.into();
        self.functions.insert(name.clone(), f.with_name(name));
        self
    }

    /// Register a plain closure under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut D, &mut UnitContext<'_>, &Params) -> Result<()> + 'static,
    {
        self.register(name, TransformFn::new(f))
    }

    /// Resolve a name.
    ///
    /// # Errors
    /// [`TransformError::Configuration`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<TransformFn<D>> {
        self.functions.get(name).cloned().ok_or_else(|| {
            TransformError::Configuration(format!(
                "'{}' is not a registered transform function",
                name
            ))
        })
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn resolve(&self, name: Option<&str>) -> Result<Option<TransformFn<D>>> {
        name.map(|n| self.get(n)).transpose()
    }
}

/// Serializable snapshot of a [`TransformUnit`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    /// Whether the unit was trained.
    pub trained: bool,
    /// Unit configuration.
    pub config: UnitConfig,
    /// Registered name of the train function.
    pub train_fn: Option<String>,
    /// Registered name of the predict function.
    pub predict_fn: Option<String>,
    /// Contents of the store.
    pub input: InputStore,
}

impl UnitState {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn function_name<D>(f: Option<&TransformFn<D>>, role: &str) -> Result<Option<String>> {
    match f {
        None => Ok(None),
        Some(f) => f.name().map(|n| Some(n.to_string())).ok_or_else(|| {
            TransformError::Configuration(format!(
                "cannot persist an anonymous {} function; register it by name",
                role
            ))
        }),
    }
}

impl<D: Dataset> TransformUnit<D> {
    /// Build an untrained unit from registered function names.
    ///
    /// # Errors
    /// [`TransformError::Configuration`] if a given name is not registered.
    pub fn from_registry(
        registry: &FunctionRegistry<D>,
        train: Option<&str>,
        predict: Option<&str>,
        config: UnitConfig,
    ) -> Result<Self> {
        Ok(Self::with_config(
            registry.resolve(train)?,
            registry.resolve(predict)?,
            config,
        ))
    }

    /// Snapshot the unit for persistence.
    ///
    /// # Errors
    /// [`TransformError::Configuration`] if a function has no name.
    pub fn state(&self) -> Result<UnitState> {
        Ok(UnitState {
            trained: self.trained,
            config: self.config.clone(),
            train_fn: function_name(self.train_fn.as_ref(), "train")?,
            predict_fn: function_name(self.predict_fn.as_ref(), "predict")?,
            input: self.input.clone(),
        })
    }

    /// Rebuild a unit from a snapshot, resolving functions by name.
    pub fn restore(state: UnitState, registry: &FunctionRegistry<D>) -> Result<Self> {
        let mut input = state.input;
        if state.trained {
            input.freeze();
        }
        Ok(Self {
            train_fn: registry.resolve(state.train_fn.as_deref())?,
            predict_fn: registry.resolve(state.predict_fn.as_deref())?,
            trained: state.trained,
            input,
            config: state.config,
        })
    }

    /// Serialize the unit's state to JSON.
    pub fn to_json(&self) -> Result<String> {
        self.state()?.to_json()
    }

    /// Save the unit's state to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a unit saved with [`TransformUnit::save_to_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P, registry: &FunctionRegistry<D>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::restore(UnitState::from_json(&json)?, registry)
    }
}
