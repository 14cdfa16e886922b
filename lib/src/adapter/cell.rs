//! Per-column functions and the context they run in.

use crate::error::Result;
use crate::frame::{Column, Dataset};
use crate::params::Params;
use crate::store::CellMemory;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Symbolic reference to one column of a named dataset.
///
/// Passed instead of plain values when expression capture is enabled, so the
/// cell function can record where its input came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    /// Handle of the dataset the column belongs to.
    pub dataset: String,
    /// Column name.
    pub column: String,
    /// Column position at call time.
    pub index: usize,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[\"{}\"]", self.dataset, self.column)
    }
}

/// First argument of a cell function.
#[derive(Clone, Debug)]
pub enum CellInput<'a> {
    /// The column's values.
    Values(&'a [Value]),
    /// A reference to the column, with its values still reachable.
    Reference {
        reference: ColumnRef,
        values: &'a [Value],
    },
}

impl<'a> CellInput<'a> {
    /// The column's values, whichever form was passed.
    pub fn values(&self) -> &'a [Value] {
        match self {
            CellInput::Values(values) => values,
            CellInput::Reference { values, .. } => values,
        }
    }

    /// The captured reference, if expression capture was active.
    pub fn reference(&self) -> Option<&ColumnRef> {
        match self {
            CellInput::Values(_) => None,
            CellInput::Reference { reference, .. } => Some(reference),
        }
    }
}

/// State visible to a cell function while it processes one column.
pub struct CellContext<'a, D> {
    memory: CellMemory<'a>,
    trained: bool,
    dataset: &'a D,
}

impl<'a, D: Dataset> CellContext<'a, D> {
    pub(crate) fn new(memory: CellMemory<'a>, trained: bool, dataset: &'a D) -> Self {
        Self {
            memory,
            trained,
            dataset,
        }
    }

    /// Whether the owning unit was trained when the call started.
    pub fn trained(&self) -> bool {
        self.trained
    }

    /// This column's private memory.
    pub fn memory(&self) -> &CellMemory<'a> {
        &self.memory
    }

    /// This column's private memory, for recording what training learns.
    pub fn memory_mut(&mut self) -> &mut CellMemory<'a> {
        &mut self.memory
    }

    /// The dataset being transformed.
    ///
    /// Columns processed earlier in the same call already hold their new values.
    pub fn dataset(&self) -> &'a D {
        self.dataset
    }

    /// Values behind a captured reference.
    pub fn resolve(&self, reference: &ColumnRef) -> Option<&'a [Value]> {
        self.dataset.get_column(&reference.column)
    }
}

type ValuesFn<D> = dyn Fn(CellInput<'_>, &mut CellContext<'_, D>, &Params) -> Result<Column>;
type NamedFn<D> = dyn Fn(CellInput<'_>, &str, &mut CellContext<'_, D>, &Params) -> Result<Column>;

/// A per-column function, declared as name-aware or not.
pub enum CellFn<D> {
    /// Receives only the column input.
    Values(Rc<ValuesFn<D>>),
    /// Also receives the column name.
    Named(Rc<NamedFn<D>>),
}

impl<D> CellFn<D> {
    /// A cell function that does not need the column name.
    pub fn values<F>(f: F) -> Self
    where
        F: Fn(CellInput<'_>, &mut CellContext<'_, D>, &Params) -> Result<Column> + 'static,
    {
        CellFn::Values(Rc::new(f))
    }

    /// A cell function that receives the column name as its second argument.
    pub fn named<F>(f: F) -> Self
    where
        F: Fn(CellInput<'_>, &str, &mut CellContext<'_, D>, &Params) -> Result<Column> + 'static,
    {
        CellFn::Named(Rc::new(f))
    }

    /// Whether the function receives the column name.
    pub fn is_named(&self) -> bool {
        matches!(self, CellFn::Named(_))
    }

    pub(crate) fn call(
        &self,
        input: CellInput<'_>,
        name: &str,
        ctx: &mut CellContext<'_, D>,
        params: &Params,
    ) -> Result<Column> {
        match self {
            CellFn::Values(f) => f(input, ctx, params),
            CellFn::Named(f) => f(input, name, ctx, params),
        }
    }
}

impl<D> Clone for CellFn<D> {
    fn clone(&self) -> Self {
        match self {
            CellFn::Values(f) => CellFn::Values(Rc::clone(f)),
            CellFn::Named(f) => CellFn::Named(Rc::clone(f)),
        }
    }
}

impl<D> fmt::Debug for CellFn<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellFn::Values(_) => write!(f, "CellFn::Values(..)"),
            CellFn::Named(_) => write!(f, "CellFn::Named(..)"),
        }
    }
}
