//! Z-score standardization.
//!
//! ```text
//! z = (x - u) / s
//! ```
//! where `u` is the training mean and `s` the population standard deviation
//! (ddof = 0). A zero deviation is replaced by 1 so constant columns map to 0.

use crate::adapter::CellFn;
use crate::error::{Result, TransformError};
use crate::frame::{as_number, Column, Dataset};
use serde_json::{json, Value};

/// Cell that standardizes a numeric column.
///
/// Nulls pass through untouched. Numeric strings are accepted.
///
/// # Errors
/// The cell fails when a non-null value is not numeric, or when training sees
/// no numeric values at all.
pub fn standardize<D: Dataset>() -> CellFn<D> {
    CellFn::named(|input, name, ctx, _params| {
        let values = input.values();
        if !ctx.trained() {
            let (mean, std) = fit(values, name)?;
            ctx.memory_mut().insert("mean", mean)?;
            ctx.memory_mut().insert("std", std)?;
        }
        let mean: f64 = ctx.memory().require("mean")?;
        let std: f64 = ctx.memory().require("std")?;
        scale(values, name, mean, std)
    })
}

fn number(value: &Value, name: &str) -> Result<f64> {
    as_number(value).ok_or_else(|| {
        TransformError::cell(format!(
            "column '{}': cannot standardize non-numeric value {}",
            name, value
        ))
    })
}

fn fit(values: &[Value], name: &str) -> Result<(f64, f64)> {
    let numbers = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| number(v, name))
        .collect::<Result<Vec<f64>>>()?;
    if numbers.is_empty() {
        return Err(TransformError::cell(format!(
            "column '{}': cannot fit on a column without numeric values",
            name
        )));
    }

    // Welford's update; a plain sum overflows long before the mean does
    let (mut mean, mut m2) = (0.0, 0.0);
    for (k, x) in numbers.iter().enumerate() {
        let delta = x - mean;
        mean += delta / (k + 1) as f64;
        m2 += delta * (x - mean);
    }
    let std = (m2 / numbers.len() as f64).sqrt();
    if !mean.is_finite() || !std.is_finite() {
        return Err(TransformError::cell(format!(
            "column '{}': statistics are not finite",
            name
        )));
    }
    Ok((mean, if std == 0.0 { 1.0 } else { std }))
}

fn scale(values: &[Value], name: &str, mean: f64, std: f64) -> Result<Column> {
    values
        .iter()
        .map(|v| {
            if v.is_null() {
                return Ok(Value::Null);
            }
            Ok(json!((number(v, name)? - mean) / std))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::make_column_transformation;
    use crate::frame::DataFrame;
    use crate::params::Params;
    use crate::unit::TransformUnit;

    fn unit() -> TransformUnit {
        TransformUnit::new(Some(make_column_transformation(standardize(), false)), None)
    }

    fn column(values: Vec<Value>) -> DataFrame {
        DataFrame::from_columns(vec![("x", values)]).unwrap()
    }

    #[test]
    fn test_standardize_fit() {
        let mut unit = unit();
        unit.run(&mut column(vec![json!(1.0), json!(2.0), json!(3.0), json!(4.0)]), &Params::new())
            .unwrap();

        let memory = unit.input_store().column_memory("x").unwrap().clone();
        assert_eq!(memory["mean"], json!(2.5));
        let std = memory["std"].as_f64().unwrap();
        assert!((std - 1.118034).abs() < 1e-5);
    }

    #[test]
    fn test_standardize_transform_uses_training_stats() {
        let mut unit = unit();
        let mut out = column(vec![json!(0.0), json!(10.0)]);
        unit.run(&mut out, &Params::new()).unwrap();
        assert_eq!(out.get_column("x").unwrap(), &[json!(-1.0), json!(1.0)]);

        let mut out = column(vec![json!(20.0)]);
        unit.run(&mut out, &Params::new()).unwrap();
        assert_eq!(out.get_column("x").unwrap(), &[json!(3.0)]);
    }

    #[test]
    fn test_standardize_constant_column() {
        let mut unit = unit();
        let mut out = column(vec![json!(5.0), json!(5.0)]);
        unit.run(&mut out, &Params::new()).unwrap();
        assert_eq!(out.get_column("x").unwrap(), &[json!(0.0), json!(0.0)]);
        assert_eq!(unit.input()["x"]["std"], json!(1.0));
    }

    #[test]
    fn test_standardize_keeps_nulls() {
        let mut unit = unit();
        let mut out = column(vec![json!(1.0), Value::Null, json!("3")]);
        unit.run(&mut out, &Params::new()).unwrap();
        assert_eq!(out.get_column("x").unwrap(), &[json!(-1.0), Value::Null, json!(1.0)]);
    }

    #[test]
    fn test_standardize_rejects_text() {
        let mut unit = unit();
        let err = unit
            .run(&mut column(vec![json!(1.0), json!("abc")]), &Params::new())
            .unwrap_err();
        assert!(matches!(err, TransformError::Cell(_)));
        assert!(err.to_string().contains("column 'x'"));
    }

    #[test]
    fn test_standardize_huge_values() {
        let mut unit = unit();
        let mut out = column(vec![json!(1e308), json!(1e308)]);
        unit.run(&mut out, &Params::new()).unwrap();
        assert_eq!(out.get_column("x").unwrap(), &[json!(0.0), json!(0.0)]);
        assert_eq!(unit.input()["x"]["mean"], json!(1e308));
    }

    #[test]
    fn test_standardize_rejects_overflowing_variance() {
        let mut unit = unit();
        let err = unit
            .run(&mut column(vec![json!(1e308), json!(-1e308)]), &Params::new())
            .unwrap_err();
        assert!(matches!(err, TransformError::Cell(_)));
        assert!(err.to_string().contains("statistics are not finite"));
        assert!(!unit.trained());
    }

    #[test]
    fn test_standardize_empty_column() {
        let mut unit = unit();
        let err = unit.run(&mut column(vec![Value::Null]), &Params::new()).unwrap_err();
        assert!(err.to_string().contains("without numeric values"));
    }
}
