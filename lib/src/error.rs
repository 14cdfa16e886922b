//! Error types for transform units and column adapters.
//!
//! Every fallible operation in the crate returns [`TransformError`]. The
//! lifecycle and data-integrity failures have their own nested enums so that
//! callers can match on them precisely:
//!
//! - [`StateError`] - invalid train/predict transitions and writes to a frozen store
//! - [`DataIntegrityError`] - datasets the column adapter refuses to touch
//!
//! Errors raised by cell functions travel through the adapter untouched.

use thiserror::Error;

/// Number of offending names listed in a duplicate-column error.
pub const MAX_LISTED_DUPLICATES: usize = 5;

/// Invalid lifecycle transitions of a transform unit.
#[derive(Debug, Error)]
pub enum StateError {
    /// `train` was called on a unit that is already trained.
    #[error("transform unit has already been trained; build it with enforce_train = false to allow retraining")]
    AlreadyTrained,

    /// `predict` was called before the unit was trained.
    #[error("transform unit has not been trained yet")]
    NotTrained,

    /// A write was attempted on a store that was frozen after training.
    #[error("cannot write key '{key}': input store is frozen after training")]
    Frozen { key: String },
}

/// Datasets the column adapter refuses to operate on.
#[derive(Debug, Error)]
pub enum DataIntegrityError {
    /// The dataset carries duplicate column names.
    #[error("dataset has duplicated column names: {}", list_names(.names, .total))]
    DuplicateColumns {
        /// The first few offending names, in dataset order.
        names: Vec<String>,
        /// Total number of distinct duplicated names.
        total: usize,
    },

    /// A selected column collides with a key reserved by the input store.
    #[error("column name '{0}' is reserved by the input store")]
    ReservedColumnName(String),

    /// Columns recorded at training time are absent from the dataset.
    #[error("columns recorded at training time are missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl DataIntegrityError {
    /// Build a duplicate-column error from the full list of duplicated names.
    pub fn duplicate_columns(all: Vec<String>) -> Self {
        let total = all.len();
        let names = all.into_iter().take(MAX_LISTED_DUPLICATES).collect();
        DataIntegrityError::DuplicateColumns { names, total }
    }
}

fn list_names(names: &[String], total: &usize) -> String {
    let total = *total;
    let listed = names
        .iter()
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ");
    if total > names.len() {
        format!("{} (and {} more)", listed, total - names.len())
    } else {
        listed
    }
}

/// Top-level error for every operation in the crate.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A unit or adapter was configured with something it cannot use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid lifecycle transition or frozen-store write.
    #[error(transparent)]
    State(#[from] StateError),

    /// Dataset rejected by the column adapter.
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    /// Column specification could not be resolved.
    #[error("column selection failed: {0}")]
    Selection(String),

    /// A column was replaced with values of the wrong length.
    #[error("invalid shape for column '{column}': expected {expected} rows, got {got}")]
    InvalidShape {
        column: String,
        expected: usize,
        got: usize,
    },

    /// A column looked up by name does not exist.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Error raised inside a cell or transform function.
    #[error(transparent)]
    Cell(Box<dyn std::error::Error + Send + Sync>),

    /// JSON (de)serialization of store values or unit state failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while saving or loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV input could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TransformError {
    /// Wrap an arbitrary error (or message) raised by user code.
    pub fn cell<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TransformError::Cell(err.into())
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TransformError>;
