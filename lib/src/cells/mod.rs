//! Ready-made stateful cell functions.
//!
//! Each cell learns per-column statistics on the training call, records them in
//! the column's memory, and replays them on every later call:
//!
//! | cell               | memory keys   | effect                                  |
//! |--------------------|---------------|-----------------------------------------|
//! | [`standardize`]    | `mean`, `std` | `(x - mean) / std`, nulls kept          |
//! | [`impute`]         | `fill`        | nulls replaced by `fill`                |
//! | [`ordinal_encode`] | `categories`  | value replaced by its category index    |
//!
//! Wrap them with [`make_column_transformation`](crate::make_column_transformation)
//! to get a transform function.

mod impute;
mod ordinal;
mod standard;

pub use impute::{impute, ImputeStrategy};
pub use ordinal::{ordinal_encode, ordinal_encode_with, HandleUnknown};
pub use standard::standardize;
