//! Column specifications and their resolution against a dataset.

use crate::error::{Result, TransformError};
use crate::frame::Dataset;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

/// Metadata handed to a [`ColumnSpec::Predicate`].
///
/// Values are borrowed lazily, so predicates that only look at names stay
/// cheap on wide datasets.
pub struct ColumnMeta<'a> {
    /// Position of the column in the dataset.
    pub index: usize,
    /// Column name.
    pub name: &'a str,
    values: Option<&'a [Value]>,
}

impl<'a> ColumnMeta<'a> {
    /// The column's values.
    pub fn values(&self) -> &'a [Value] {
        self.values.unwrap_or(&[])
    }

    /// Whether every non-null value is a JSON number.
    pub fn is_numeric(&self) -> bool {
        self.values()
            .iter()
            .all(|v| v.is_null() || v.is_number())
    }
}

type PredicateFn = dyn Fn(&ColumnMeta<'_>) -> bool;

/// Specifies which columns a transformation applies to.
#[derive(Clone, Default)]
pub enum ColumnSpec {
    /// All columns, in dataset order.
    #[default]
    All,
    /// Columns by name, in the given order.
    Names(Vec<String>),
    /// Columns by position.
    Indices(Vec<usize>),
    /// A range of positions.
    Range(Range<usize>),
    /// Columns whose metadata satisfies the predicate, in dataset order.
    Predicate(Rc<PredicateFn>),
}

impl ColumnSpec {
    /// Select columns by name.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSpec::Names(names.into_iter().map(Into::into).collect())
    }

    /// Select columns by predicate over their metadata.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&ColumnMeta<'_>) -> bool + 'static,
    {
        ColumnSpec::Predicate(Rc::new(f))
    }

    /// Select numeric columns.
    pub fn numeric() -> Self {
        Self::predicate(|meta| meta.is_numeric())
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::All => write!(f, "All"),
            ColumnSpec::Names(names) => f.debug_tuple("Names").field(names).finish(),
            ColumnSpec::Indices(indices) => f.debug_tuple("Indices").field(indices).finish(),
            ColumnSpec::Range(range) => f.debug_tuple("Range").field(range).finish(),
            ColumnSpec::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// Resolves a [`ColumnSpec`] into concrete column names.
///
/// Implementations must be deterministic for a fixed `(spec, dataset)` pair
/// and return distinct names.
pub trait ColumnSelector<D> {
    /// Resolve `spec` against `dataset`.
    fn resolve(&self, spec: &ColumnSpec, dataset: &D) -> Result<Vec<String>>;
}

/// Standard resolution of every [`ColumnSpec`] form.
///
/// Unknown names pass through untouched (callers intersect with the dataset);
/// positions out of bounds are an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSelector;

impl<D: Dataset> ColumnSelector<D> for DefaultSelector {
    fn resolve(&self, spec: &ColumnSpec, dataset: &D) -> Result<Vec<String>> {
        let names = dataset.column_names();
        let resolved: Vec<String> = match spec {
            ColumnSpec::All => names.to_vec(),
            ColumnSpec::Names(wanted) => wanted.clone(),
            ColumnSpec::Indices(indices) => by_position(names, indices.iter().copied())?,
            ColumnSpec::Range(range) => by_position(names, range.clone())?,
            ColumnSpec::Predicate(predicate) => names
                .iter()
                .enumerate()
                .filter(|(index, name)| {
                    predicate(&ColumnMeta {
                        index: *index,
                        name: name.as_str(),
                        values: dataset.column_at(*index),
                    })
                })
                .map(|(_, name)| name.clone())
                .collect(),
        };
        Ok(distinct(resolved))
    }
}

fn by_position(names: &[String], positions: impl Iterator<Item = usize>) -> Result<Vec<String>> {
    positions
        .map(|index| {
            names.get(index).cloned().ok_or_else(|| {
                TransformError::Selection(format!(
                    "column index {} out of bounds ({} columns)",
                    index,
                    names.len()
                ))
            })
        })
        .collect()
}

fn distinct(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
