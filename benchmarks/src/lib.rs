//! Shared fixtures for datastep benchmarks.
//!
//! Frames are synthetic and deterministic so runs are comparable across
//! machines and commits.

use datastep::{ColumnSpec, DataFrame, Params, Result};
use serde_json::{json, Value};

/// Name of the `i`-th generated column.
pub fn column_name(i: usize) -> String {
    format!("c{:04}", i)
}

/// Frame with `n_cols` numeric columns of `n_rows` rows each.
///
/// Every fifth cell is null so imputation has work to do.
pub fn wide_frame(n_cols: usize, n_rows: usize) -> Result<DataFrame> {
    let columns = (0..n_cols)
        .map(|c| {
            let values: Vec<Value> = (0..n_rows)
                .map(|r| {
                    if (r + c) % 5 == 0 {
                        Value::Null
                    } else {
                        json!(((r * 31 + c * 17) % 1000) as f64 * 0.1)
                    }
                })
                .collect();
            (column_name(c), values)
        })
        .collect();
    DataFrame::from_columns(columns)
}

/// Params selecting the first `n` generated columns.
pub fn first_columns(n: usize) -> Params {
    Params::new().columns(ColumnSpec::names((0..n).map(column_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datastep::Dataset;

    #[test]
    fn test_wide_frame_shape() {
        let frame = wide_frame(3, 10).unwrap();
        assert_eq!(frame.column_count(), 3);
        assert_eq!(frame.n_rows(), 10);
        assert!(frame.get_column("c0000").unwrap()[0].is_null());
        assert!(frame.duplicate_names().is_empty());
    }
}
