//! Stateful train/predict transform units.
//!
//! A [`TransformUnit`] wraps a train function and a predict function together
//! with the [`InputStore`] they share. Functions transform the dataset in
//! place; a call that fails hands the dataset back to the caller as the
//! function left it. The first call trains: the function may
//! write whatever it learns into the store. Once training succeeds the store
//! is frozen and every later call replays the learned transformation.
//!
//! The state machine:
//! ```text
//!              run / train                    run / predict
//! Untrained ----------------> Trained <-------------------+
//!                               |                          |
//!                               +--------------------------+
//!                               |  train (enforce_train = false only)
//!                               +--> retrain on a fresh store
//! ```
//!
//! # Example
//! ```rust
//! use datastep::{make_column_transformation, CellFn, ColumnSpec, DataFrame, Dataset, Params, TransformUnit};
//! use serde_json::{json, Value};
//!
//! let doubler = make_column_transformation(
//!     CellFn::values(|input, _ctx, _params| {
//!         Ok(input.values().iter().map(|v| json!(v.as_i64().unwrap_or(0) * 2)).collect())
//!     }),
//!     false,
//! );
//! let mut unit = TransformUnit::new(Some(doubler), None);
//!
//! let mut train = DataFrame::from_columns(vec![("A", vec![json!(1), json!(2), json!(3)])]).unwrap();
//! unit.run(&mut train, &Params::new().columns(ColumnSpec::names(["A"]))).unwrap();
//! assert_eq!(train.get_column("A").unwrap(), &[json!(2), json!(4), json!(6)]);
//! assert!(unit.trained());
//!
//! let mut later = DataFrame::from_columns(vec![("A", vec![json!(10)])]).unwrap();
//! unit.run(&mut later, &Params::new()).unwrap();
//! assert_eq!(later.get_column("A").unwrap(), &[json!(20)]);
//! ```
//!
//! # Concurrency
//!
//! Units are neither `Send` nor `Sync`: their functions are reference-counted
//! without atomic bounds. Use one unit per thread, or serialize access.

use crate::error::{Result, StateError};
use crate::frame::{DataFrame, Dataset};
use crate::params::Params;
use crate::store::InputStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

mod registry;

pub use registry::{FunctionRegistry, UnitState};

/// State visible to a transform function during one call.
pub struct UnitContext<'a> {
    store: &'a mut InputStore,
    trained: bool,
}

impl<'a> UnitContext<'a> {
    pub(crate) fn new(store: &'a mut InputStore, trained: bool) -> Self {
        Self { store, trained }
    }

    /// Whether the unit was trained when this call started.
    ///
    /// Reads `false` for the whole duration of the training call.
    pub fn trained(&self) -> bool {
        self.trained
    }

    /// Read access to the unit's store.
    pub fn store(&self) -> &InputStore {
        self.store
    }

    /// Write access to the unit's store. Writes fail when it is frozen.
    pub fn store_mut(&mut self) -> &mut InputStore {
        self.store
    }
}

type TransformFnInner<D> = dyn Fn(&mut D, &mut UnitContext<'_>, &Params) -> Result<()>;

/// A whole-dataset function executed by a [`TransformUnit`].
///
/// Functions may carry a name; only named functions can be persisted with a
/// unit and resolved again through a [`FunctionRegistry`].
pub struct TransformFn<D> {
    name: Option<String>,
    func: Rc<TransformFnInner<D>>,
}

impl<D> TransformFn<D> {
    /// Wrap an anonymous function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut D, &mut UnitContext<'_>, &Params) -> Result<()> + 'static,
    {
        Self {
            name: None,
            func: Rc::new(f),
        }
    }

    /// Wrap a function under a name.
    pub fn named<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut D, &mut UnitContext<'_>, &Params) -> Result<()> + 'static,
    {
        Self::new(f).with_name(name)
    }

    /// Attach or replace the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The function's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Invoke the function on `dataset` in place.
    pub fn call(&self, dataset: &mut D, ctx: &mut UnitContext<'_>, params: &Params) -> Result<()> {
        (self.func)(dataset, ctx, params)
    }
}

impl<D> Clone for TransformFn<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Rc::clone(&self.func),
        }
    }
}

impl<D> fmt::Debug for TransformFn<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Configuration for a [`TransformUnit`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// If true, a trained unit refuses to train again.
    pub enforce_train: bool,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            enforce_train: true,
        }
    }
}

impl UnitConfig {
    /// Set whether retraining a trained unit is refused.
    pub fn with_enforce_train(mut self, enforce_train: bool) -> Self {
        self.enforce_train = enforce_train;
        self
    }
}

/// Stateful two-mode dataset transformation.
pub struct TransformUnit<D = DataFrame> {
    train_fn: Option<TransformFn<D>>,
    predict_fn: Option<TransformFn<D>>,
    trained: bool,
    input: InputStore,
    config: UnitConfig,
}

impl<D: Dataset> TransformUnit<D> {
    /// Create an untrained unit with the default configuration.
    ///
    /// A missing train function is identity. A missing predict function
    /// falls back to the train function.
    pub fn new(train_fn: Option<TransformFn<D>>, predict_fn: Option<TransformFn<D>>) -> Self {
        Self::with_config(train_fn, predict_fn, UnitConfig::default())
    }

    /// Create an untrained unit with an explicit configuration.
    pub fn with_config(
        train_fn: Option<TransformFn<D>>,
        predict_fn: Option<TransformFn<D>>,
        config: UnitConfig,
    ) -> Self {
        Self {
            train_fn,
            predict_fn,
            trained: false,
            input: InputStore::new(),
            config,
        }
    }

    /// Start building a unit.
    pub fn builder() -> TransformUnitBuilder<D> {
        TransformUnitBuilder::default()
    }

    /// Train if untrained, otherwise predict.
    #[instrument(name = "datastep::unit::run", level = "debug", skip_all, fields(trained = self.trained))]
    pub fn run(&mut self, dataset: &mut D, params: &Params) -> Result<()> {
        if self.trained {
            self.execute_predict(dataset, params)
        } else {
            self.execute_train(dataset, params)
        }
    }

    /// Force the training path.
    ///
    /// # Errors
    /// [`StateError::AlreadyTrained`] if the unit is trained and
    /// `enforce_train` is set.
    #[instrument(name = "datastep::unit::train", level = "debug", skip_all, fields(trained = self.trained))]
    pub fn train(&mut self, dataset: &mut D, params: &Params) -> Result<()> {
        if self.trained && self.config.enforce_train {
            warn!("refusing to retrain a trained unit");
            return Err(StateError::AlreadyTrained.into());
        }
        self.execute_train(dataset, params)
    }

    /// Force the prediction path.
    ///
    /// # Errors
    /// [`StateError::NotTrained`] if the unit has not been trained.
    #[instrument(name = "datastep::unit::predict", level = "debug", skip_all)]
    pub fn predict(&mut self, dataset: &mut D, params: &Params) -> Result<()> {
        if !self.trained {
            return Err(StateError::NotTrained.into());
        }
        self.execute_predict(dataset, params)
    }

    fn execute_train(&mut self, dataset: &mut D, params: &Params) -> Result<()> {
        // Retraining starts over; the old store survives a failed attempt.
        let mut store = InputStore::new();
        if let Some(f) = &self.train_fn {
            f.call(dataset, &mut UnitContext::new(&mut store, false), params)?;
        }
        store.freeze();
        self.input = store;
        self.trained = true;
        debug!(entries = self.input.len(), "unit trained");
        Ok(())
    }

    fn execute_predict(&mut self, dataset: &mut D, params: &Params) -> Result<()> {
        let Some(f) = self.predict_fn.as_ref().or(self.train_fn.as_ref()) else {
            return Ok(());
        };
        f.call(dataset, &mut UnitContext::new(&mut self.input, true), params)
    }

    /// Whether the unit has been trained.
    pub fn trained(&self) -> bool {
        self.trained
    }

    /// Plain copy of the store's contents.
    pub fn input(&self) -> Map<String, Value> {
        self.input.snapshot()
    }

    /// Read-only access to the store.
    pub fn input_store(&self) -> &InputStore {
        &self.input
    }

    /// The unit's configuration.
    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    /// The train function, if any.
    pub fn train_fn(&self) -> Option<&TransformFn<D>> {
        self.train_fn.as_ref()
    }

    /// The predict function, if one was given explicitly.
    pub fn predict_fn(&self) -> Option<&TransformFn<D>> {
        self.predict_fn.as_ref()
    }
}

impl<D> fmt::Debug for TransformUnit<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformUnit")
            .field("train_fn", &self.train_fn)
            .field("predict_fn", &self.predict_fn)
            .field("trained", &self.trained)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TransformUnit`].
pub struct TransformUnitBuilder<D> {
    train_fn: Option<TransformFn<D>>,
    predict_fn: Option<TransformFn<D>>,
    config: UnitConfig,
}

impl<D> Default for TransformUnitBuilder<D> {
    fn default() -> Self {
        Self {
            train_fn: None,
            predict_fn: None,
            config: UnitConfig::default(),
        }
    }
}

impl<D: Dataset> TransformUnitBuilder<D> {
    /// Set the train function.
    pub fn train(mut self, f: TransformFn<D>) -> Self {
        self.train_fn = Some(f);
        self
    }

    /// Set the predict function.
    pub fn predict(mut self, f: TransformFn<D>) -> Self {
        self.predict_fn = Some(f);
        self
    }

    /// Set whether retraining a trained unit is refused.
    pub fn enforce_train(mut self, enforce_train: bool) -> Self {
        self.config.enforce_train = enforce_train;
        self
    }

    /// Build the untrained unit.
    pub fn build(self) -> TransformUnit<D> {
        TransformUnit::with_config(self.train_fn, self.predict_fn, self.config)
    }
}
