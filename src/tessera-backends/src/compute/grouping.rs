//! Hash grouping of record batches.
//!
//! Key columns are encoded with the Arrow row format so that any
//! combination of key types hashes and compares as bytes. Groups are
//! numbered in first-appearance order.

use std::collections::HashMap;
use std::fmt;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::row::{Row, RowConverter, SortField};
use common_error::TesseraResult;
use tessera_expr::compliant::Backend;
use tessera_expr::expr::AggFunc;

use super::aggregate::{create_accumulator, result_type};
use super::scalar::values_to_array;
use super::selection::{batch_of, column, positions, take_array};

/// A native aggregation of one column, as the Arrow-backed engines run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAgg {
    pub func: AggFunc,
    pub input: String,
    pub output: String,
    /// The engine's spelling of `func`.
    pub native: &'static str,
}

impl NativeAgg {
    /// Aggregation of `input` into `output`, spelled the way backend `B`
    /// names `func`.
    pub fn new<B: Backend>(func: AggFunc, input: &str, output: &str) -> Self {
        Self {
            func,
            input: input.to_string(),
            output: output.to_string(),
            native: B::native_aggregation(func.name()).unwrap_or(func.name()),
        }
    }
}

impl fmt::Display for NativeAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) AS {}", self.native, self.input, self.output)
    }
}

/// Row numbers of each group, groups in first-appearance order.
///
/// Without keys the whole batch is one group, even when it is empty. With
/// `drop_null_keys`, rows with a null in any key are left out; otherwise
/// null is a key value like any other.
pub fn group_rows(
    batch: &RecordBatch,
    keys: &[String],
    drop_null_keys: bool,
) -> TesseraResult<Vec<Vec<usize>>> {
    if keys.is_empty() {
        return Ok(vec![(0..batch.num_rows()).collect()]);
    }
    let columns = keys
        .iter()
        .map(|key| column(batch, key))
        .collect::<TesseraResult<Vec<_>>>()?;
    let converter = RowConverter::new(
        columns
            .iter()
            .map(|c| SortField::new(c.data_type().clone()))
            .collect(),
    )?;
    let rows = converter.convert_columns(&columns)?;

    let mut slots: HashMap<Row<'_>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..batch.num_rows() {
        if drop_null_keys && columns.iter().any(|c| c.is_null(i)) {
            continue;
        }
        let slot = *slots.entry(rows.row(i)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    Ok(groups)
}

/// Group `batch` by `keys` and run `aggs`; keys first, then one column per
/// aggregation.
pub fn aggregate(
    batch: &RecordBatch,
    keys: &[String],
    aggs: &[NativeAgg],
    drop_null_keys: bool,
) -> TesseraResult<RecordBatch> {
    let groups = group_rows(batch, keys, drop_null_keys)?;
    let mut out = Vec::with_capacity(keys.len() + aggs.len());

    let firsts = positions(groups.iter().filter_map(|rows| rows.first().copied()))?;
    for key in keys {
        out.push((key.clone(), take_array(&column(batch, key)?, &firsts)?));
    }

    for agg in aggs {
        let input = column(batch, &agg.input)?;
        let mut values = Vec::with_capacity(groups.len());
        for rows in &groups {
            let part = take_array(&input, &positions(rows.iter().copied())?)?;
            let mut acc = create_accumulator(agg.func, input.data_type())?;
            acc.update(&part)?;
            values.push(acc.finalize()?);
        }
        let dtype = result_type(agg.func, input.data_type())?;
        out.push((agg.output.clone(), values_to_array(&values, Some(&dtype))?));
    }
    batch_of(out, groups.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};

    use super::*;
    use crate::columnar::Columnar;

    fn agg(func: AggFunc, input: &str, output: &str) -> NativeAgg {
        NativeAgg::new::<Columnar>(func, input, output)
    }

    fn sample() -> RecordBatch {
        let k: ArrayRef = Arc::new(StringArray::from(vec![Some("x"), None, Some("y"), Some("x")]));
        let v: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4]));
        batch_of(vec![("k".into(), k), ("v".into(), v)], 4).unwrap()
    }

    #[test]
    fn test_first_appearance_order() {
        let groups = group_rows(&sample(), &["k".to_string()], false).unwrap();
        assert_eq!(groups, vec![vec![0, 3], vec![1], vec![2]]);
        let groups = group_rows(&sample(), &["k".to_string()], true).unwrap();
        assert_eq!(groups, vec![vec![0, 3], vec![2]]);
    }

    #[test]
    fn test_aggregate() {
        let out = aggregate(
            &sample(),
            &["k".to_string()],
            &[agg(AggFunc::Sum, "v", "total"), agg(AggFunc::Mean, "v", "avg")],
            true,
        )
        .unwrap();
        assert_eq!(out.num_rows(), 2);
        let total: ArrayRef = Arc::new(Int64Array::from(vec![5, 3]));
        assert_eq!(out.column(1).as_ref(), total.as_ref());
        let avg: ArrayRef = Arc::new(Float64Array::from(vec![2.5, 3.0]));
        assert_eq!(out.column(2).as_ref(), avg.as_ref());
    }

    #[test]
    fn test_no_keys_is_one_group() {
        let empty = sample().slice(0, 0);
        let out = aggregate(&empty, &[], &[agg(AggFunc::Len, "v", "n")], false).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(
            agg(AggFunc::Len, "v", "n").to_string(),
            "count_all(v) AS n"
        );
    }
}
