//! Row selection: broadcast, filter, take, reshape and batch assembly.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, AsArray, BooleanArray, UInt32Array};
use arrow::compute::{
    concat, concat_batches, filter, filter_record_batch, is_not_null, lexsort_to_indices,
    sort_to_indices, take, SortColumn, SortOptions,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use common_error::{TesseraError, TesseraResult};
use tessera_expr::expr::Reshape;

/// Row positions as an Arrow index array.
pub fn positions(rows: impl IntoIterator<Item = usize>) -> TesseraResult<UInt32Array> {
    rows.into_iter()
        .map(|row| {
            u32::try_from(row)
                .map(Some)
                .map_err(|_| TesseraError::value_error(format!("row {row} exceeds u32 indexing")))
        })
        .collect()
}

/// Repeat a one-value array `len` times.
pub fn broadcast(array: &ArrayRef, len: usize) -> TesseraResult<ArrayRef> {
    if array.len() == len {
        return Ok(Arc::clone(array));
    }
    if array.len() != 1 {
        return Err(TesseraError::value_error(format!(
            "cannot broadcast a column of length {} to length {len}",
            array.len()
        )));
    }
    Ok(take(array.as_ref(), &positions(std::iter::repeat(0).take(len))?, None)?)
}

/// Bring two arrays to a common length, broadcasting a one-value side.
pub fn align_lengths(left: &ArrayRef, right: &ArrayRef) -> TesseraResult<(ArrayRef, ArrayRef)> {
    match (left.len(), right.len()) {
        (l, r) if l == r => Ok((Arc::clone(left), Arc::clone(right))),
        (1, r) => Ok((broadcast(left, r)?, Arc::clone(right))),
        (l, 1) => Ok((Arc::clone(left), broadcast(right, l)?)),
        (l, r) => Err(TesseraError::value_error(format!(
            "lengths don't match: {l} != {r}"
        ))),
    }
}

/// Interpret `mask` as a boolean array.
pub fn as_mask(mask: &ArrayRef) -> TesseraResult<&BooleanArray> {
    mask.as_boolean_opt().ok_or_else(|| {
        TesseraError::type_error(format!(
            "filter predicate must be boolean, got {}",
            mask.data_type()
        ))
    })
}

/// Keep the values where `mask` is true; a null mask entry drops the row.
pub fn filter_array(array: &ArrayRef, mask: &ArrayRef) -> TesseraResult<ArrayRef> {
    let mask = broadcast(mask, array.len())?;
    Ok(filter(array.as_ref(), as_mask(&mask)?)?)
}

pub fn take_array(array: &ArrayRef, indices: &UInt32Array) -> TesseraResult<ArrayRef> {
    Ok(take(array.as_ref(), indices, None)?)
}

/// Row positions a reshape keeps, in output order; `None` when the
/// operation is not a pure selection (`shift`).
pub fn reshape_positions(array: &ArrayRef, op: Reshape) -> TesseraResult<Option<UInt32Array>> {
    let len = array.len();
    let rows = match op {
        Reshape::Head(n) => positions(0..n.min(len))?,
        Reshape::Tail(n) => positions(len - n.min(len)..len)?,
        Reshape::DropNulls => {
            let valid = is_not_null(array.as_ref())?;
            positions((0..len).filter(|&i| valid.value(i)))?
        }
        Reshape::Sort { descending } => sort_to_indices(
            array.as_ref(),
            Some(SortOptions {
                descending,
                nulls_first: false,
            }),
            None,
        )?,
        Reshape::Shift(_) => return Ok(None),
    };
    Ok(Some(rows))
}

/// Apply a reshape to a single array.
pub fn reshape(array: &ArrayRef, op: Reshape) -> TesseraResult<ArrayRef> {
    match reshape_positions(array, op)? {
        Some(rows) => take_array(array, &rows),
        None => match op {
            Reshape::Shift(n) => shift(array, n),
            other => Err(TesseraError::internal(format!(
                "`{}` has no positions",
                other.label()
            ))),
        },
    }
}

fn shift(array: &ArrayRef, n: i64) -> TesseraResult<ArrayRef> {
    let len = array.len();
    let by = usize::try_from(n.unsigned_abs()).map_or(len, |by| by.min(len));
    let nulls = new_null_array(array.data_type(), by);
    let kept = if n >= 0 {
        array.slice(0, len - by)
    } else {
        array.slice(by, len - by)
    };
    let parts: [&dyn Array; 2] = if n >= 0 {
        [nulls.as_ref(), kept.as_ref()]
    } else {
        [kept.as_ref(), nulls.as_ref()]
    };
    Ok(concat(&parts)?)
}

/// A batch with an explicit row count, so that zero-column batches keep
/// their height.
pub fn batch_from(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
    num_rows: usize,
) -> TesseraResult<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Assemble named columns of equal length into a batch.
pub fn batch_of(columns: Vec<(String, ArrayRef)>, num_rows: usize) -> TesseraResult<RecordBatch> {
    let mut seen = Vec::with_capacity(columns.len());
    for (name, _) in &columns {
        if seen.contains(&name) {
            return Err(TesseraError::value_error(format!(
                "column `{name}` appears more than once; names must be unique"
            )));
        }
        seen.push(name);
    }
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    batch_from(Arc::new(Schema::new(fields)), arrays, num_rows)
}

/// Column `name` of `batch`.
pub fn column(batch: &RecordBatch, name: &str) -> TesseraResult<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| TesseraError::column_not_found(name))
}

pub fn filter_batch(batch: &RecordBatch, mask: &ArrayRef) -> TesseraResult<RecordBatch> {
    let mask = broadcast(mask, batch.num_rows())?;
    Ok(filter_record_batch(batch, as_mask(&mask)?)?)
}

pub fn take_batch(batch: &RecordBatch, indices: &UInt32Array) -> TesseraResult<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), indices, None))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TesseraError::execution(format!("Failed to reorder columns: {e}")))?;
    batch_from(batch.schema(), columns, indices.len())
}

/// Row order sorting `batch` by `by`, nulls last.
pub fn sort_indices(
    batch: &RecordBatch,
    by: &[String],
    descending: &[bool],
) -> TesseraResult<UInt32Array> {
    if by.is_empty() {
        return positions(0..batch.num_rows());
    }
    let sort_columns = by
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Ok(SortColumn {
                values: column(batch, name)?,
                options: Some(SortOptions {
                    descending: descending.get(i).or(descending.last()).copied().unwrap_or(false),
                    nulls_first: false,
                }),
            })
        })
        .collect::<TesseraResult<Vec<_>>>()?;
    lexsort_to_indices(&sort_columns, None)
        .map_err(|e| TesseraError::execution(format!("Failed to sort: {e}")))
}

pub fn sort_batch(
    batch: &RecordBatch,
    by: &[String],
    descending: &[bool],
) -> TesseraResult<RecordBatch> {
    take_batch(batch, &sort_indices(batch, by, descending)?)
}

pub fn head_batch(batch: &RecordBatch, n: usize) -> RecordBatch {
    batch.slice(0, n.min(batch.num_rows()))
}

/// Rename columns; names absent from `mapping` are kept.
pub fn rename_batch(
    batch: &RecordBatch,
    mapping: &BTreeMap<String, String>,
) -> TesseraResult<RecordBatch> {
    if let Some(missing) = mapping.keys().find(|name| batch.column_by_name(name).is_none()) {
        return Err(TesseraError::column_not_found(missing.clone()));
    }
    let columns = batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| {
            let name = mapping.get(field.name()).unwrap_or(field.name());
            (name.clone(), Arc::clone(array))
        })
        .collect();
    batch_of(columns, batch.num_rows())
}

/// Keep only `names`, in that order.
pub fn project_batch(batch: &RecordBatch, names: &[String]) -> TesseraResult<RecordBatch> {
    let columns = names
        .iter()
        .map(|name| Ok((name.clone(), column(batch, name)?)))
        .collect::<TesseraResult<Vec<_>>>()?;
    batch_of(columns, batch.num_rows())
}

pub fn drop_columns(batch: &RecordBatch, names: &[String]) -> TesseraResult<RecordBatch> {
    if let Some(missing) = names.iter().find(|name| batch.column_by_name(name).is_none()) {
        return Err(TesseraError::column_not_found(missing.clone()));
    }
    let kept: Vec<String> = column_names(batch)
        .into_iter()
        .filter(|name| !names.contains(name))
        .collect();
    project_batch(batch, &kept)
}

pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

/// Stack batches whose column-name sets match; later batches are
/// reordered to the first one's column order.
pub fn vstack(batches: &[RecordBatch]) -> TesseraResult<RecordBatch> {
    let Some(first) = batches.first() else {
        return Err(TesseraError::value_error("No items to concatenate"));
    };
    let names = column_names(first);
    let mut sorted = names.clone();
    sorted.sort();
    let mut aligned = Vec::with_capacity(batches.len());
    for batch in batches {
        let mut other = column_names(batch);
        other.sort();
        if other != sorted {
            return Err(TesseraError::column_mismatch(format!(
                "unable to vstack, column names don't match: {:?} vs {:?}",
                names,
                column_names(batch)
            )));
        }
        aligned.push(project_batch(batch, &names)?);
    }
    let schema = aligned[0].schema();
    let num_rows = aligned.iter().map(RecordBatch::num_rows).sum();
    if schema.fields().is_empty() {
        return batch_from(schema, Vec::new(), num_rows);
    }
    Ok(concat_batches(&schema, &aligned)?)
}

/// Place batches of equal height side by side.
pub fn hstack(batches: &[RecordBatch]) -> TesseraResult<RecordBatch> {
    let num_rows = batches.first().map_or(0, RecordBatch::num_rows);
    let mut columns = Vec::new();
    for batch in batches {
        if batch.num_rows() != num_rows {
            return Err(TesseraError::value_error(format!(
                "unable to hstack, frames have {} and {} rows",
                num_rows,
                batch.num_rows()
            )));
        }
        for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
            columns.push((field.name().clone(), Arc::clone(array)));
        }
    }
    batch_of(columns, num_rows)
}

/// A batch with the schema of `columns` and zero rows.
pub fn empty_batch(columns: &[(String, DataType)]) -> TesseraResult<RecordBatch> {
    batch_of(
        columns
            .iter()
            .map(|(name, dtype)| (name.clone(), new_null_array(dtype, 0)))
            .collect(),
        0,
    )
}

#[cfg(test)]
mod tests {
    use arrow::array::{Int64Array, StringArray};

    use super::*;

    fn ints(values: &[Option<i64>]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }

    fn sample() -> RecordBatch {
        batch_of(
            vec![
                ("a".into(), ints(&[Some(2), None, Some(1)])),
                (
                    "b".into(),
                    Arc::new(StringArray::from(vec!["x", "y", "z"])) as ArrayRef,
                ),
            ],
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_broadcast() {
        let one = ints(&[Some(5)]);
        let out = broadcast(&one, 3).unwrap();
        assert_eq!(out.as_ref(), ints(&[Some(5); 3]).as_ref());
        assert!(broadcast(&ints(&[Some(1), Some(2)]), 3).is_err());
    }

    #[test]
    fn test_reshape() {
        let a = ints(&[Some(3), None, Some(1), Some(2)]);
        let head = reshape(&a, Reshape::Head(2)).unwrap();
        assert_eq!(head.as_ref(), ints(&[Some(3), None]).as_ref());
        let tail = reshape(&a, Reshape::Tail(10)).unwrap();
        assert_eq!(tail.len(), 4);
        let sorted = reshape(&a, Reshape::Sort { descending: false }).unwrap();
        assert_eq!(sorted.as_ref(), ints(&[Some(1), Some(2), Some(3), None]).as_ref());
        let shifted = reshape(&a, Reshape::Shift(1)).unwrap();
        assert_eq!(shifted.as_ref(), ints(&[None, Some(3), None, Some(1)]).as_ref());
        let back = reshape(&a, Reshape::Shift(-3)).unwrap();
        assert_eq!(back.as_ref(), ints(&[Some(2), None, None, None]).as_ref());
        let dropped = reshape(&a, Reshape::DropNulls).unwrap();
        assert_eq!(dropped.len(), 3);
    }

    #[test]
    fn test_sort_batch_nulls_last() {
        let sorted = sort_batch(&sample(), &["a".into()], &[true]).unwrap();
        assert_eq!(sorted.column(0).as_ref(), ints(&[Some(2), Some(1), None]).as_ref());
    }

    #[test]
    fn test_vstack_requires_matching_names() {
        let other = batch_of(vec![("a".into(), ints(&[Some(1)])), ("c".into(), ints(&[Some(1)]))], 1)
            .unwrap();
        let err = vstack(&[sample(), other]).unwrap_err();
        assert!(matches!(err, TesseraError::ColumnMismatch(_)));
        assert!(err.to_string().contains("unable to vstack, column names don't match"));

        let swapped = project_batch(&sample(), &["b".into(), "a".into()]).unwrap();
        let stacked = vstack(&[sample(), swapped]).unwrap();
        assert_eq!(stacked.num_rows(), 6);
        assert_eq!(column_names(&stacked), ["a", "b"]);
    }

    #[test]
    fn test_batch_helpers() {
        let renamed =
            rename_batch(&sample(), &BTreeMap::from([("a".into(), "x".into())])).unwrap();
        assert_eq!(column_names(&renamed), ["x", "b"]);
        let dropped = drop_columns(&sample(), &["a".into()]).unwrap();
        assert_eq!(column_names(&dropped), ["b"]);
        assert!(matches!(
            drop_columns(&sample(), &["nope".into()]),
            Err(TesseraError::ColumnNotFound(_))
        ));
        let empty = project_batch(&sample(), &[]).unwrap();
        assert_eq!(empty.num_rows(), 3);
        assert!(hstack(&[sample(), renamed]).is_err());
    }
}
