//! Lift a per-column function into a whole-dataset transform.
//!
//! A [`ColumnAdapter`] applies one [`CellFn`] to every selected column. At
//! training time it resolves the column selection, records it under
//! [`COLUMNS_KEY`](crate::store::COLUMNS_KEY) and gives each column a fresh
//! private memory. At prediction time it replays the recorded columns and hands
//! each cell the memory its column learned, read-only.
//!
//! ```text
//! train:    columns --resolve--> [a, b] --+--> cell(a, memory_a) --> store["a"]
//!                                         +--> cell(b, memory_b) --> store["b"]
//!                                         +--> store["_columns"] = [a, b]
//!
//! predict:  store["_columns"] ------------> cell(a, store["a"]) ...
//! ```
//!
//! # Example
//! ```rust
//! use datastep::{make_column_transformation, CellFn, ColumnSpec, DataFrame, Dataset, Params, TransformUnit};
//! use serde_json::json;
//!
//! // Shift each column so its training minimum becomes zero.
//! let shift = make_column_transformation(
//!     CellFn::values(|input, ctx, _params| {
//!         if !ctx.trained() {
//!             let min = input.values().iter().filter_map(|v| v.as_f64()).fold(f64::INFINITY, f64::min);
//!             ctx.memory_mut().insert("min", min)?;
//!         }
//!         let min: f64 = ctx.memory().require("min")?;
//!         Ok(input.values().iter().map(|v| json!(v.as_f64().unwrap_or(min) - min)).collect())
//!     }),
//!     false,
//! );
//! let mut unit = TransformUnit::new(Some(shift), None);
//!
//! let mut train = DataFrame::from_columns(vec![
//!     ("a", vec![json!(2.0), json!(5.0)]),
//!     ("b", vec![json!(1.0), json!(3.0)]),
//! ]).unwrap();
//! unit.run(&mut train, &Params::new().columns(ColumnSpec::names(["a"]))).unwrap();
//! assert_eq!(train.get_column("a").unwrap(), &[json!(0.0), json!(3.0)]);
//! assert_eq!(train.get_column("b").unwrap(), &[json!(1.0), json!(3.0)]);
//! assert_eq!(unit.input()["_columns"], json!(["a"]));
//! ```

mod cell;

pub use cell::{CellContext, CellFn, CellInput, ColumnRef};

use crate::error::{DataIntegrityError, Result, TransformError};
use crate::frame::Dataset;
use crate::params::Params;
use crate::selector::{ColumnSelector, ColumnSpec, DefaultSelector};
use crate::store::{CellMemory, InputStore, COLUMNS_KEY};
use crate::unit::{TransformFn, UnitContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

/// What prediction does with recorded columns the dataset no longer has.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingColumnPolicy {
    /// Skip them and log a warning.
    #[default]
    Skip,
    /// Fail with [`DataIntegrityError::MissingColumns`] before touching the dataset.
    Error,
}

/// Configuration for a [`ColumnAdapter`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Pass [`CellInput::Reference`] instead of plain values when the dataset
    /// has a handle.
    pub capture_expressions: bool,
    /// Handling of recorded columns absent at prediction time.
    pub missing_columns: MissingColumnPolicy,
}

impl AdapterConfig {
    pub fn with_capture_expressions(mut self, capture: bool) -> Self {
        self.capture_expressions = capture;
        self
    }

    pub fn with_missing_columns(mut self, policy: MissingColumnPolicy) -> Self {
        self.missing_columns = policy;
        self
    }
}

/// Applies a [`CellFn`] column by column, with per-column memory.
pub struct ColumnAdapter<D> {
    cell: CellFn<D>,
    config: AdapterConfig,
    selector: Rc<dyn ColumnSelector<D>>,
}

impl<D: Dataset + 'static> ColumnAdapter<D> {
    /// Adapter with the default configuration and [`DefaultSelector`].
    pub fn new(cell: CellFn<D>) -> Self {
        Self {
            cell,
            config: AdapterConfig::default(),
            selector: Rc::new(DefaultSelector),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capture_expressions(mut self, capture: bool) -> Self {
        self.config.capture_expressions = capture;
        self
    }

    pub fn missing_columns(mut self, policy: MissingColumnPolicy) -> Self {
        self.config.missing_columns = policy;
        self
    }

    /// Use a custom column selector.
    pub fn selector<S>(mut self, selector: S) -> Self
    where
        S: ColumnSelector<D> + 'static,
    {
        self.selector = Rc::new(selector);
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Turn the adapter into a transform function for a [`TransformUnit`](crate::TransformUnit).
    pub fn build(self) -> TransformFn<D> {
        TransformFn::new(move |dataset, ctx, params| self.apply(dataset, ctx, params))
    }

    /// Run the adapter once against `dataset`, rewriting selected columns in place.
    ///
    /// Training or prediction is chosen by `ctx.trained()`. On a cell error the
    /// columns processed before the failing one keep their new values.
    ///
    /// # Errors
    /// - [`DataIntegrityError::DuplicateColumns`] if the dataset has repeated
    ///   column names; the dataset is not touched.
    /// - [`DataIntegrityError::ReservedColumnName`] if training would process a
    ///   column named `_columns`.
    /// - [`TransformError::Configuration`] if predicting from a store without
    ///   recorded columns.
    /// - Any error returned by the cell function, unchanged.
    #[instrument(name = "datastep::adapter::apply", level = "debug", skip_all, fields(trained = ctx.trained()))]
    pub fn apply(&self, dataset: &mut D, ctx: &mut UnitContext<'_>, params: &Params) -> Result<()> {
        let duplicates = dataset.duplicate_names();
        if !duplicates.is_empty() {
            return Err(DataIntegrityError::duplicate_columns(duplicates).into());
        }

        let trained = ctx.trained();
        let columns = if trained {
            self.recorded_columns(ctx.store(), dataset)?
        } else {
            let columns = self.training_columns(dataset, params)?;
            ctx.store_mut().insert(COLUMNS_KEY, &columns)?;
            columns
        };

        let capture = self.config.capture_expressions && dataset.handle().is_some();
        if self.config.capture_expressions && !capture {
            trace!("dataset has no handle, passing values");
        }

        let empty = Map::new();
        for name in &columns {
            let Some(index) = dataset.position(name) else {
                continue;
            };
            debug!(column = %name, index, "applying cell");

            if trained {
                let recorded = ctx.store().column_memory(name).unwrap_or(&empty);
                let output = {
                    let view: &D = dataset;
                    let input = cell_input(view, name, index, capture)?;
                    let mut cell_ctx = CellContext::new(CellMemory::Frozen(recorded), true, view);
                    self.cell.call(input, name, &mut cell_ctx, params)?
                };
                dataset.set_column_at(index, output)?;
            } else {
                let mut memory = InputStore::new();
                let output = {
                    let view: &D = dataset;
                    let input = cell_input(view, name, index, capture)?;
                    let mut cell_ctx = CellContext::new(CellMemory::Open(&mut memory), false, view);
                    self.cell.call(input, name, &mut cell_ctx, params)?
                };
                dataset.set_column_at(index, output)?;
                trace!(column = %name, entries = memory.len(), "recorded column memory");
                ctx.store_mut().insert(name.as_str(), Value::Object(memory.into_map()))?;
            }
        }

        Ok(())
    }

    fn training_columns(&self, dataset: &D, params: &Params) -> Result<Vec<String>> {
        let all = ColumnSpec::All;
        let spec = params.column_spec().unwrap_or(&all);
        let resolved = self.selector.resolve(spec, dataset)?;

        let mut seen = HashSet::with_capacity(resolved.len());
        let columns: Vec<String> = resolved
            .into_iter()
            .filter(|name| dataset.position(name).is_some() && seen.insert(name.clone()))
            .collect();

        if columns.iter().any(|name| name == COLUMNS_KEY) {
            return Err(DataIntegrityError::ReservedColumnName(COLUMNS_KEY.to_string()).into());
        }
        debug!(?spec, ?columns, "resolved training columns");
        Ok(columns)
    }

    fn recorded_columns(&self, store: &InputStore, dataset: &D) -> Result<Vec<String>> {
        let columns = store.columns().ok_or_else(|| {
            TransformError::Configuration(format!(
                "store has no '{}' entry; the unit was not trained by a column adapter",
                COLUMNS_KEY
            ))
        })?;

        let missing: Vec<String> = columns
            .iter()
            .filter(|name| dataset.position(name).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            match self.config.missing_columns {
                MissingColumnPolicy::Skip => {
                    warn!(?missing, "skipping trained columns absent from dataset");
                }
                MissingColumnPolicy::Error => {
                    return Err(DataIntegrityError::MissingColumns(missing).into());
                }
            }
        }
        Ok(columns)
    }
}

fn cell_input<'d, D: Dataset>(dataset: &'d D, name: &str, index: usize, capture: bool) -> Result<CellInput<'d>> {
    let values = dataset
        .column_at(index)
        .ok_or_else(|| TransformError::MissingColumn(name.to_string()))?;
    match dataset.handle() {
        Some(handle) if capture => Ok(CellInput::Reference {
            reference: ColumnRef {
                dataset: handle.to_string(),
                column: name.to_string(),
                index,
            },
            values,
        }),
        _ => Ok(CellInput::Values(values)),
    }
}

impl<D> fmt::Debug for ColumnAdapter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnAdapter")
            .field("cell", &self.cell)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build a transform function that applies `cell` to each selected column.
///
/// Shorthand for `ColumnAdapter::new(cell).capture_expressions(capture).build()`.
pub fn make_column_transformation<D: Dataset + 'static>(cell: CellFn<D>, capture: bool) -> TransformFn<D> {
    ColumnAdapter::new(cell).capture_expressions(capture).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use crate::frame::DataFrame;
    use crate::unit::TransformUnit;
    use serde_json::json;
    use std::cell::RefCell;

    fn frame() -> DataFrame {
        DataFrame::from_columns(vec![
            ("x", vec![json!(1.0), json!(2.0), json!(3.0)]),
            ("y", vec![json!(10.0), json!(20.0), json!(30.0)]),
            ("label", vec![json!("a"), json!("b"), json!("c")]),
        ])
        .unwrap()
    }

    /// Subtracts the training mean of each column.
    fn center() -> CellFn<DataFrame> {
        CellFn::values(|input, ctx, _params| {
            let values = input.values();
            if !ctx.trained() {
                let sum: f64 = values.iter().filter_map(Value::as_f64).sum();
                ctx.memory_mut().insert("mean", sum / values.len() as f64)?;
            }
            let mean: f64 = ctx.memory().require("mean")?;
            Ok(values.iter().map(|v| json!(v.as_f64().unwrap_or(0.0) - mean)).collect())
        })
    }

    fn numeric() -> Params {
        Params::new().columns(ColumnSpec::names(["x", "y"]))
    }

    #[test]
    fn test_train_records_columns_and_memory() {
        let mut unit = TransformUnit::new(Some(make_column_transformation(center(), false)), None);
        let mut out = frame();
        unit.run(&mut out, &numeric()).unwrap();

        assert_eq!(out.get_column("x").unwrap(), &[json!(-1.0), json!(0.0), json!(1.0)]);
        assert_eq!(out.get_column("label").unwrap(), &[json!("a"), json!("b"), json!("c")]);

        let input = unit.input();
        assert_eq!(input[COLUMNS_KEY], json!(["x", "y"]));
        assert_eq!(input["x"], json!({ "mean": 2.0 }));
        assert_eq!(input["y"], json!({ "mean": 20.0 }));
    }

    #[test]
    fn test_predict_replays_recorded_columns() {
        let mut unit = TransformUnit::new(Some(make_column_transformation(center(), false)), None);
        unit.run(&mut frame(), &numeric()).unwrap();

        // Column selection at prediction time is ignored.
        let params = Params::new().columns(ColumnSpec::names(["x"]));
        let mut out = frame();
        unit.run(&mut out, &params).unwrap();
        assert_eq!(out.get_column("y").unwrap(), &[json!(-10.0), json!(0.0), json!(10.0)]);
    }

    #[test]
    fn test_unknown_names_are_dropped() {
        let mut unit = TransformUnit::new(Some(make_column_transformation(center(), false)), None);
        let params = Params::new().columns(ColumnSpec::names(["ghost", "x", "x"]));
        unit.run(&mut frame(), &params).unwrap();
        assert_eq!(unit.input()[COLUMNS_KEY], json!(["x"]));
    }

    #[test]
    fn test_duplicate_columns_rejected_before_mutation() {
        let mut dup = DataFrame::new();
        dup.push_column("a", vec![json!(1)]).unwrap();
        dup.push_column("a", vec![json!(2)]).unwrap();
        dup.push_column("b", vec![json!(3)]).unwrap();

        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let cell = CellFn::values(move |input: CellInput<'_>, _: &mut CellContext<'_, DataFrame>, _: &Params| {
            *counter.borrow_mut() += 1;
            Ok(input.values().to_vec())
        });
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);

        let err = unit.run(&mut dup, &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            TransformError::DataIntegrity(DataIntegrityError::DuplicateColumns { .. })
        ));
        assert!(err.to_string().contains("\"a\""));
        assert_eq!(*calls.borrow(), 0);
        assert!(!unit.trained());

        // The rejected frame stays with the caller, untouched
        assert_eq!(dup.column_names(), vec!["a", "a", "b"]);
        assert_eq!(dup.column_at(0).unwrap(), &[json!(1)]);
        assert_eq!(dup.column_at(1).unwrap(), &[json!(2)]);
        assert_eq!(dup.column_at(2).unwrap(), &[json!(3)]);
    }

    #[test]
    fn test_failed_cell_leaves_frame_with_caller() {
        let cell = CellFn::named(|input: CellInput<'_>, name: &str, _: &mut CellContext<'_, DataFrame>, _: &Params| {
            if name == "y" {
                return Err(TransformError::cell("bad column"));
            }
            Ok(input.values().iter().map(|_| json!(0)).collect())
        });
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);
        let mut df = frame();
        unit.run(&mut df, &numeric()).unwrap_err();

        assert_eq!(df.get_column("x").unwrap(), &[json!(0), json!(0), json!(0)]);
        assert_eq!(df.get_column("y").unwrap(), &[json!(10.0), json!(20.0), json!(30.0)]);
        assert_eq!(df.column_count(), 3);
    }

    #[test]
    fn test_named_cell_receives_column_names_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let cell = CellFn::named(
            move |input: CellInput<'_>, name: &str, _: &mut CellContext<'_, DataFrame>, _: &Params| {
                sink.borrow_mut().push(name.to_string());
                Ok(input.values().to_vec())
            },
        );
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);
        unit.run(&mut frame(), &Params::new().columns(ColumnSpec::names(["y", "x"]))).unwrap();
        unit.run(&mut frame(), &Params::new()).unwrap();
        assert_eq!(*seen.borrow(), vec!["y", "x", "y", "x"]);
    }

    #[test]
    fn test_capture_passes_reference_for_named_dataset() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let cell = CellFn::values(
            move |input: CellInput<'_>, ctx: &mut CellContext<'_, DataFrame>, _: &Params| {
                let rendered = input.reference().map(|r| r.to_string());
                if let Some(reference) = input.reference() {
                    assert_eq!(ctx.resolve(reference).unwrap(), input.values());
                }
                sink.borrow_mut().push(rendered);
                Ok(input.values().to_vec())
            },
        );
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, true)), None);
        let params = Params::new().columns(ColumnSpec::names(["x"]));

        unit.run(&mut frame().named("train"), &params).unwrap();
        unit.run(&mut frame(), &params).unwrap();
        assert_eq!(*seen.borrow(), vec![Some("train[\"x\"]".to_string()), None]);
    }

    #[test]
    fn test_values_passed_without_capture() {
        let cell = CellFn::values(|input: CellInput<'_>, _: &mut CellContext<'_, DataFrame>, _: &Params| {
            assert!(input.reference().is_none());
            Ok(input.values().to_vec())
        });
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);
        unit.run(&mut frame().named("train"), &Params::new()).unwrap();
    }

    #[test]
    fn test_cell_memory_frozen_during_predict() {
        let cell = CellFn::values(|input: CellInput<'_>, ctx: &mut CellContext<'_, DataFrame>, _: &Params| {
            ctx.memory_mut().insert("seen", true)?;
            Ok(input.values().to_vec())
        });
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);
        unit.run(&mut frame(), &Params::new()).unwrap();

        let err = unit.run(&mut frame(), &Params::new()).unwrap_err();
        assert!(matches!(err, TransformError::State(StateError::Frozen { ref key }) if key == "seen"));
    }

    #[test]
    fn test_cell_error_propagates_unchanged() {
        let cell = CellFn::values(|_: CellInput<'_>, _: &mut CellContext<'_, DataFrame>, _: &Params| {
            Err(TransformError::cell("cannot parse"))
        });
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);
        let err = unit.run(&mut frame(), &Params::new()).unwrap_err();
        assert!(matches!(err, TransformError::Cell(_)));
        assert_eq!(err.to_string(), "cannot parse");
        assert!(!unit.trained());
    }

    #[test]
    fn test_wrong_output_length_is_rejected() {
        let cell = CellFn::values(|_: CellInput<'_>, _: &mut CellContext<'_, DataFrame>, _: &Params| {
            Ok(vec![json!(0)])
        });
        let mut unit = TransformUnit::new(Some(make_column_transformation(cell, false)), None);
        let err = unit.run(&mut frame(), &Params::new()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidShape { .. }));
    }

    #[test]
    fn test_reserved_column_name_rejected() {
        let mut df = DataFrame::from_columns(vec![("_columns", vec![json!(1)])]).unwrap();
        let mut unit = TransformUnit::new(Some(make_column_transformation(center(), false)), None);
        let err = unit.run(&mut df, &Params::new()).unwrap_err();
        assert!(matches!(
            err,
            TransformError::DataIntegrity(DataIntegrityError::ReservedColumnName(_))
        ));
    }

    #[test]
    fn test_missing_column_skipped_by_default() {
        let mut unit = TransformUnit::new(Some(make_column_transformation(center(), false)), None);
        unit.run(&mut frame(), &numeric()).unwrap();

        let mut partial = DataFrame::from_columns(vec![("x", vec![json!(4.0)])]).unwrap();
        unit.run(&mut partial, &Params::new()).unwrap();
        assert_eq!(partial.get_column("x").unwrap(), &[json!(2.0)]);
    }

    #[test]
    fn test_missing_column_error_policy() {
        let adapter = ColumnAdapter::new(center()).missing_columns(MissingColumnPolicy::Error);
        let mut unit = TransformUnit::new(Some(adapter.build()), None);
        unit.run(&mut frame(), &numeric()).unwrap();

        let mut partial = DataFrame::from_columns(vec![("x", vec![json!(4.0)])]).unwrap();
        let err = unit.run(&mut partial, &Params::new()).unwrap_err();
        match err {
            TransformError::DataIntegrity(DataIntegrityError::MissingColumns(names)) => {
                assert_eq!(names, vec!["y"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_predict_without_recorded_columns_is_configuration_error() {
        let mut store = InputStore::new();
        let mut ctx = UnitContext::new(&mut store, true);
        let adapter = ColumnAdapter::new(center());
        let err = adapter.apply(&mut frame(), &mut ctx, &Params::new()).unwrap_err();
        assert!(matches!(err, TransformError::Configuration(_)));
    }

    #[test]
    fn test_custom_selector() {
        struct LastColumn;
        impl ColumnSelector<DataFrame> for LastColumn {
            fn resolve(&self, _: &ColumnSpec, dataset: &DataFrame) -> Result<Vec<String>> {
                Ok(dataset.column_names().last().cloned().into_iter().collect())
            }
        }

        let cell = CellFn::values(|input: CellInput<'_>, _: &mut CellContext<'_, DataFrame>, _: &Params| {
            Ok(input.values().iter().map(|_| json!("seen")).collect())
        });
        let mut unit = TransformUnit::new(Some(ColumnAdapter::new(cell).selector(LastColumn).build()), None);
        let mut out = frame();
        unit.run(&mut out, &Params::new()).unwrap();
        assert_eq!(out.get_column("label").unwrap()[0], json!("seen"));
        assert_eq!(out.get_column("x").unwrap()[0], json!(1.0));
    }

    #[test]
    fn test_config_serde() {
        let config = AdapterConfig::default()
            .with_capture_expressions(true)
            .with_missing_columns(MissingColumnPolicy::Error);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"error\""));
        let back: AdapterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
