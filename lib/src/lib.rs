//! # datastep
//!
//! Stateful dataset transformations with a strict split between the training
//! call and every call after it.
//!
//! ## Core Design Principles
//!
//! - **Learn once, replay forever**: a [`TransformUnit`] runs its train function
//!   on the first call, freezes what it learned in its [`InputStore`], and runs
//!   its predict function on every later call.
//! - **Column-wise state**: a [`ColumnAdapter`] lifts a per-column [`CellFn`] to a
//!   whole dataset, giving each column its own private memory and remembering
//!   which columns it touched.
//! - **Typed failures**: configuration, state, and data-integrity problems are
//!   distinct [`TransformError`] variants; cell errors pass through unchanged.
//!
//! ## Quick Start
//!
//! ```rust
//! use datastep::cells::{impute, standardize, ImputeStrategy};
//! use datastep::{make_column_transformation, ColumnSpec, DataFrame, Dataset, Params, TransformUnit};
//! use serde_json::{json, Value};
//!
//! let mut train = DataFrame::from_columns(vec![
//!     ("age", vec![json!(20.0), Value::Null, json!(40.0)]),
//!     ("city", vec![json!("Oslo"), json!("Lima"), json!("Oslo")]),
//! ]).unwrap();
//! let params = Params::new().columns(ColumnSpec::names(["age"]));
//!
//! let mut imputer = TransformUnit::new(Some(make_column_transformation(impute(ImputeStrategy::Mean), false)), None);
//! let mut scaler = TransformUnit::new(Some(make_column_transformation(standardize(), false)), None);
//!
//! imputer.run(&mut train, &params).unwrap();
//! scaler.run(&mut train, &params).unwrap();
//! assert_eq!(train.get_column("age").unwrap()[1], json!(0.0));
//!
//! // Later calls reuse the training statistics.
//! let mut test = DataFrame::from_columns(vec![("age", vec![Value::Null]), ("city", vec![json!("Rome")])]).unwrap();
//! imputer.run(&mut test, &Params::new()).unwrap();
//! scaler.run(&mut test, &Params::new()).unwrap();
//! assert_eq!(test.get_column("age").unwrap(), &[json!(0.0)]);
//! ```
//!
//! ## Module Structure
//!
//! - `unit` — [`TransformUnit`], its context, configuration and persistence
//! - `adapter` — [`ColumnAdapter`] and the [`CellFn`] capability
//! - `cells` — built-in stateful cells (standardize, impute, ordinal encode)
//! - `selector` — [`ColumnSpec`] and the [`ColumnSelector`] seam
//! - `store` — [`InputStore`] and per-column [`CellMemory`]
//! - `frame` — the [`Dataset`] abstraction and the in-memory [`DataFrame`]
//! - `params` — [`Params`] passed to every call
//! - `error` — the error taxonomy
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events under the `datastep` target. Install any
//! subscriber (for example `tracing_subscriber::fmt` with
//! `RUST_LOG=datastep=debug`) to see column resolution and per-column progress.

pub mod adapter;
pub mod cells;
pub mod error;
pub mod frame;
pub mod params;
pub mod selector;
pub mod store;
pub mod unit;

pub use adapter::{
    make_column_transformation, AdapterConfig, CellContext, CellFn, CellInput, ColumnAdapter, ColumnRef,
    MissingColumnPolicy,
};
pub use error::{DataIntegrityError, Result, StateError, TransformError};
pub use frame::{Column, DataFrame, Dataset};
pub use params::Params;
pub use selector::{ColumnMeta, ColumnSelector, ColumnSpec, DefaultSelector};
pub use store::{CellMemory, InputStore, COLUMNS_KEY};
pub use unit::{FunctionRegistry, TransformFn, TransformUnit, TransformUnitBuilder, UnitConfig, UnitContext, UnitState};
