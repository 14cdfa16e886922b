//! Simple imputation of missing values.
//!
//! Nulls are treated as missing. The fill value is learned once, at training
//! time, and reused on every later call.

use crate::adapter::CellFn;
use crate::error::{Result, TransformError};
use crate::frame::{as_number, Dataset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Strategy for imputing missing values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace missing values with the mean of the column.
    #[default]
    Mean,
    /// Replace missing values with the median of the column.
    Median,
    /// Replace missing values with the most frequent value of the column.
    MostFrequent,
    /// Replace missing values with a constant value.
    Constant(Value),
}

/// Cell that replaces nulls with a fill value learned by `strategy`.
///
/// `Mean` and `Median` only look at numeric values; `MostFrequent` counts any
/// non-null value and breaks ties by first appearance. A column with nothing
/// to learn from fills with `0`.
pub fn impute<D: Dataset>(strategy: ImputeStrategy) -> CellFn<D> {
    CellFn::values(move |input, ctx, _params| {
        let values = input.values();
        if !ctx.trained() {
            ctx.memory_mut().insert("fill", compute_fill(values, &strategy)?)?;
        }
        let fill: Value = ctx.memory().require("fill")?;
        Ok(values
            .iter()
            .map(|v| if v.is_null() { fill.clone() } else { v.clone() })
            .collect())
    })
}

fn compute_fill(values: &[Value], strategy: &ImputeStrategy) -> Result<Value> {
    let numbers = || values.iter().filter_map(as_number);
    let statistic = match strategy {
        ImputeStrategy::Mean => {
            // Running mean; a plain sum overflows near f64::MAX
            let mut mean = 0.0;
            let mut count = 0usize;
            for x in numbers() {
                count += 1;
                mean += (x - mean) / count as f64;
            }
            mean
        }
        ImputeStrategy::Median => {
            let mut sorted: Vec<f64> = numbers().collect();
            if sorted.is_empty() {
                return Ok(json!(0.0));
            }
            sorted.sort_by(|a, b| a.total_cmp(b));
            let n = sorted.len();
            if n % 2 == 0 {
                sorted[n / 2 - 1] / 2.0 + sorted[n / 2] / 2.0
            } else {
                sorted[n / 2]
            }
        }
        ImputeStrategy::MostFrequent => return Ok(most_frequent(values).unwrap_or_else(|| json!(0.0))),
        ImputeStrategy::Constant(value) => return Ok(value.clone()),
    };
    if !statistic.is_finite() {
        return Err(TransformError::cell(format!(
            "{:?} imputation produced a non-finite fill value",
            strategy
        )));
    }
    Ok(json!(statistic))
}

fn most_frequent(values: &[Value]) -> Option<Value> {
    // Linear scan keeps first-seen order for tie breaking; Value is not Hash.
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts
        .iter()
        .fold(None, |best: Option<(&Value, usize)>, &(value, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((value, count)),
        })
        .map(|(value, _)| value.clone())
}
