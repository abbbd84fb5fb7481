//! Reductions over Arrow arrays.
//!
//! Each aggregate function is an [`Accumulator`]: it is fed one or more
//! arrays and finalized into a single [`Value`]. Grouped aggregation feeds
//! one accumulator per group.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::kernels::concat::concat;
use arrow::compute::{cast, sort_to_indices, SortOptions};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::row::{RowConverter, SortField};
use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;
use tessera_expr::expr::{AggFunc, Probability, QuantileMethod};

use super::scalar::value_at;

/// State of one reduction.
pub trait Accumulator: Send + Sync {
    /// Feed more values.
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()>;

    /// The reduced value.
    fn finalize(&self) -> TesseraResult<Value>;

    /// Type of the reduced value.
    fn result_type(&self) -> DataType;
}

fn i64_from(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn numeric_input(func: AggFunc, dtype: &DataType) -> TesseraResult<()> {
    if dtype.is_numeric() || matches!(dtype, DataType::Boolean | DataType::Null) {
        Ok(())
    } else {
        Err(TesseraError::type_error(format!(
            "`{func}` expects a numeric column, got {dtype}"
        )))
    }
}

fn floats(values: &ArrayRef) -> TesseraResult<Vec<f64>> {
    let as_f64 = cast(values.as_ref(), &DataType::Float64)?;
    Ok(as_f64.as_primitive::<Float64Type>().iter().flatten().collect())
}

/// Sum; integers and booleans sum as Int64, floats as Float64. An empty or
/// all-null input sums to zero.
#[derive(Debug, Clone, Default)]
struct SumAccumulator {
    floating: bool,
    int_sum: i64,
    float_sum: f64,
}

impl Accumulator for SumAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        if self.floating {
            self.float_sum += floats(values)?.iter().sum::<f64>();
            return Ok(());
        }
        let ints = cast(values.as_ref(), &DataType::Int64)?;
        for v in ints.as_primitive::<Int64Type>().iter().flatten() {
            self.int_sum = self
                .int_sum
                .checked_add(v)
                .ok_or_else(|| TesseraError::execution("overflow in sum"))?;
        }
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        Ok(if self.floating {
            Value::Float64(self.float_sum)
        } else {
            Value::Int64(self.int_sum)
        })
    }

    fn result_type(&self) -> DataType {
        if self.floating {
            DataType::Float64
        } else {
            DataType::Int64
        }
    }
}

/// Mean, median, quantiles and the dispersion measures, computed over the non-null
/// values as floats.
#[derive(Debug, Clone)]
struct MomentAccumulator {
    func: AggFunc,
    values: Vec<f64>,
}

impl MomentAccumulator {
    fn variance(&self, ddof: u8) -> Option<f64> {
        let n = self.values.len();
        if n <= usize::from(ddof) {
            return None;
        }
        let mean = self.values.iter().sum::<f64>() / n as f64;
        let squares: f64 = self.values.iter().map(|v| (v - mean).powi(2)).sum();
        Some(squares / (n - usize::from(ddof)) as f64)
    }

    fn median(&self) -> Option<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        match n {
            0 => None,
            _ if n % 2 == 1 => Some(sorted[n / 2]),
            _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
        }
    }

    fn quantile(&self, quantile: Probability, method: QuantileMethod) -> Option<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let last = sorted.len().checked_sub(1)?;
        let position = last as f64 * quantile.get();
        let lower = sorted[position.floor() as usize];
        let upper = sorted[(position.ceil() as usize).min(last)];
        Some(match method {
            QuantileMethod::Lower => lower,
            QuantileMethod::Higher => upper,
            QuantileMethod::Nearest => sorted[(position.round() as usize).min(last)],
            QuantileMethod::Midpoint => (lower + upper) / 2.0,
            QuantileMethod::Linear => lower + (upper - lower) * position.fract(),
        })
    }
}

impl Accumulator for MomentAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        self.values.extend(floats(values)?);
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        let result = match self.func {
            AggFunc::Mean if self.values.is_empty() => None,
            AggFunc::Mean => Some(self.values.iter().sum::<f64>() / self.values.len() as f64),
            AggFunc::Median => self.median(),
            AggFunc::Var { ddof } => self.variance(ddof),
            AggFunc::Std { ddof } => self.variance(ddof).map(f64::sqrt),
            AggFunc::Quantile { quantile, method } => self.quantile(quantile, method),
            other => {
                return Err(TesseraError::internal(format!(
                    "`{other}` is not a moment aggregation"
                )))
            }
        };
        Ok(result.map_or(Value::Null, Value::Float64))
    }

    fn result_type(&self) -> DataType {
        DataType::Float64
    }
}

/// Min and max, for any orderable type. Nulls are ignored.
#[derive(Debug, Clone)]
struct ExtremumAccumulator {
    descending: bool,
    dtype: DataType,
    parts: Vec<ArrayRef>,
}

impl Accumulator for ExtremumAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        if values.len() > values.logical_null_count() {
            self.parts.push(Arc::clone(values));
        }
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        if self.parts.is_empty() {
            return Ok(Value::Null);
        }
        let parts: Vec<&dyn Array> = self.parts.iter().map(AsRef::as_ref).collect();
        let all = concat(&parts)?;
        let options = SortOptions {
            descending: self.descending,
            nulls_first: false,
        };
        let best = sort_to_indices(all.as_ref(), Some(options), Some(1))?;
        if best.is_empty() {
            return Ok(Value::Null);
        }
        let row = usize::try_from(best.value(0))
            .map_err(|_| TesseraError::internal("row index does not fit usize"))?;
        value_at(all.as_ref(), row)
    }

    fn result_type(&self) -> DataType {
        self.dtype.clone()
    }
}

#[derive(Debug, Clone, Copy)]
enum CountMode {
    Valid,
    Rows,
    Nulls,
}

#[derive(Debug, Clone)]
struct CountAccumulator {
    mode: CountMode,
    count: usize,
}

impl Accumulator for CountAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        self.count += match self.mode {
            CountMode::Valid => values.len() - values.logical_null_count(),
            CountMode::Rows => values.len(),
            CountMode::Nulls => values.logical_null_count(),
        };
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        Ok(Value::Int64(i64_from(self.count)))
    }

    fn result_type(&self) -> DataType {
        DataType::Int64
    }
}

/// Distinct values, null included, compared through the row format.
#[derive(Debug, Clone)]
struct DistinctAccumulator {
    parts: Vec<ArrayRef>,
}

impl Accumulator for DistinctAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        self.parts.push(Arc::clone(values));
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        let Some(first) = self.parts.first() else {
            return Ok(Value::Int64(0));
        };
        let converter = RowConverter::new(vec![SortField::new(first.data_type().clone())])?;
        let mut seen = HashSet::new();
        for part in &self.parts {
            let rows = converter.convert_columns(std::slice::from_ref(part))?;
            seen.extend(rows.iter().map(|row| row.owned()));
        }
        Ok(Value::Int64(i64_from(seen.len())))
    }

    fn result_type(&self) -> DataType {
        DataType::Int64
    }
}

/// `any` / `all` over the non-null values.
#[derive(Debug, Clone)]
struct TruthAccumulator {
    all: bool,
    state: bool,
}

impl Accumulator for TruthAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        let bools = cast(values.as_ref(), &DataType::Boolean)?;
        for v in bools.as_boolean().iter().flatten() {
            if self.all {
                self.state &= v;
            } else {
                self.state |= v;
            }
        }
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        Ok(Value::Bool(self.state))
    }

    fn result_type(&self) -> DataType {
        DataType::Boolean
    }
}

/// First or last value, nulls included.
#[derive(Debug, Clone)]
struct EdgeAccumulator {
    last: bool,
    dtype: DataType,
    value: Option<Value>,
}

impl Accumulator for EdgeAccumulator {
    fn update(&mut self, values: &ArrayRef) -> TesseraResult<()> {
        if values.is_empty() || (!self.last && self.value.is_some()) {
            return Ok(());
        }
        let row = if self.last { values.len() - 1 } else { 0 };
        self.value = Some(value_at(values.as_ref(), row)?);
        Ok(())
    }

    fn finalize(&self) -> TesseraResult<Value> {
        Ok(self.value.clone().unwrap_or(Value::Null))
    }

    fn result_type(&self) -> DataType {
        self.dtype.clone()
    }
}

/// Create an accumulator of `func` over values of type `input_type`.
pub fn create_accumulator(
    func: AggFunc,
    input_type: &DataType,
) -> TesseraResult<Box<dyn Accumulator>> {
    Ok(match func {
        AggFunc::Sum => {
            numeric_input(func, input_type)?;
            Box::new(SumAccumulator {
                floating: input_type.is_floating(),
                ..Default::default()
            })
        }
        AggFunc::Quantile { quantile, .. } if !(0.0..=1.0).contains(&quantile.get()) => {
            return Err(TesseraError::value_error(format!(
                "`quantile` must be between 0 and 1, got {}",
                quantile.get()
            )))
        }
        AggFunc::Mean
        | AggFunc::Median
        | AggFunc::Std { .. }
        | AggFunc::Var { .. }
        | AggFunc::Quantile { .. } => {
            numeric_input(func, input_type)?;
            Box::new(MomentAccumulator {
                func,
                values: Vec::new(),
            })
        }
        AggFunc::Min | AggFunc::Max => Box::new(ExtremumAccumulator {
            descending: func == AggFunc::Max,
            dtype: input_type.clone(),
            parts: Vec::new(),
        }),
        AggFunc::Count => Box::new(CountAccumulator {
            mode: CountMode::Valid,
            count: 0,
        }),
        AggFunc::Len => Box::new(CountAccumulator {
            mode: CountMode::Rows,
            count: 0,
        }),
        AggFunc::NullCount => Box::new(CountAccumulator {
            mode: CountMode::Nulls,
            count: 0,
        }),
        AggFunc::NUnique => Box::new(DistinctAccumulator { parts: Vec::new() }),
        AggFunc::Any | AggFunc::All => {
            if !matches!(input_type, DataType::Boolean | DataType::Null) {
                return Err(TesseraError::type_error(format!(
                    "`{func}` expects a boolean column, got {input_type}"
                )));
            }
            Box::new(TruthAccumulator {
                all: func == AggFunc::All,
                state: func == AggFunc::All,
            })
        }
        AggFunc::First | AggFunc::Last => Box::new(EdgeAccumulator {
            last: func == AggFunc::Last,
            dtype: input_type.clone(),
            value: None,
        }),
    })
}

/// Type `func` produces from values of type `input_type`.
pub fn result_type(func: AggFunc, input_type: &DataType) -> TesseraResult<DataType> {
    Ok(create_accumulator(func, input_type)?.result_type())
}

/// Reduce `values` with `func`.
pub fn reduce(func: AggFunc, values: &ArrayRef) -> TesseraResult<Value> {
    let mut acc = create_accumulator(func, values.data_type())?;
    acc.update(values)?;
    acc.finalize()
}

#[cfg(test)]
mod tests {
    use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};

    use super::*;

    fn ints(values: &[Option<i64>]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }

    #[test]
    fn test_basic_reductions() {
        let a = ints(&[Some(4), None, Some(1), Some(7)]);
        assert_eq!(reduce(AggFunc::Sum, &a).unwrap(), Value::Int64(12));
        assert_eq!(reduce(AggFunc::Mean, &a).unwrap(), Value::Float64(4.0));
        assert_eq!(reduce(AggFunc::Median, &a).unwrap(), Value::Float64(4.0));
        assert_eq!(reduce(AggFunc::Min, &a).unwrap(), Value::Int64(1));
        assert_eq!(reduce(AggFunc::Max, &a).unwrap(), Value::Int64(7));
        assert_eq!(reduce(AggFunc::Count, &a).unwrap(), Value::Int64(3));
        assert_eq!(reduce(AggFunc::Len, &a).unwrap(), Value::Int64(4));
        assert_eq!(reduce(AggFunc::NullCount, &a).unwrap(), Value::Int64(1));
        assert_eq!(reduce(AggFunc::First, &a).unwrap(), Value::Int64(4));
        assert_eq!(reduce(AggFunc::Last, &a).unwrap(), Value::Int64(7));
    }

    #[test]
    fn test_dispersion_respects_ddof() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(
            reduce(AggFunc::Var { ddof: 0 }, &a).unwrap(),
            Value::Float64(1.25)
        );
        let Value::Float64(var) = reduce(AggFunc::Var { ddof: 1 }, &a).unwrap() else {
            panic!("expected a float");
        };
        assert!((var - 5.0 / 3.0).abs() < 1e-12);
        let single = ints(&[Some(1)]);
        assert_eq!(reduce(AggFunc::Std { ddof: 1 }, &single).unwrap(), Value::Null);
    }

    #[test]
    fn test_quantile_methods() {
        let a = ints(&[Some(1), Some(3), None, Some(2)]);
        let quantile = |q: f64, method: QuantileMethod| {
            let func = AggFunc::Quantile {
                quantile: Probability::new(q),
                method,
            };
            reduce(func, &a).unwrap()
        };
        assert_eq!(quantile(0.3, QuantileMethod::Lower), Value::Float64(1.0));
        assert_eq!(quantile(0.3, QuantileMethod::Higher), Value::Float64(2.0));
        assert_eq!(quantile(0.3, QuantileMethod::Nearest), Value::Float64(2.0));
        assert_eq!(quantile(0.3, QuantileMethod::Midpoint), Value::Float64(1.5));
        let Value::Float64(linear) = quantile(0.3, QuantileMethod::Linear) else {
            panic!("expected a float");
        };
        assert!((linear - 1.6).abs() < 1e-12);
        assert_eq!(quantile(1.0, QuantileMethod::Linear), Value::Float64(3.0));
        let median = AggFunc::Quantile {
            quantile: Probability::new(0.5),
            method: QuantileMethod::Linear,
        };
        assert_eq!(reduce(median, &ints(&[])).unwrap(), Value::Null);

        let out_of_range = AggFunc::Quantile {
            quantile: Probability::new(1.5),
            method: QuantileMethod::Linear,
        };
        assert!(matches!(
            reduce(out_of_range, &a),
            Err(TesseraError::ValueError(_))
        ));
    }

    #[test]
    fn test_n_unique_counts_null() {
        let a = ints(&[Some(1), None, Some(1), None, Some(2)]);
        assert_eq!(reduce(AggFunc::NUnique, &a).unwrap(), Value::Int64(3));
    }

    #[test]
    fn test_strings_and_booleans() {
        let s: ArrayRef = Arc::new(StringArray::from(vec![Some("b"), None, Some("a")]));
        assert_eq!(reduce(AggFunc::Min, &s).unwrap(), Value::from("a"));
        assert!(reduce(AggFunc::Sum, &s).is_err());

        let b: ArrayRef = Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)]));
        assert_eq!(reduce(AggFunc::Any, &b).unwrap(), Value::Bool(true));
        assert_eq!(reduce(AggFunc::All, &b).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_empty_inputs() {
        let empty = ints(&[]);
        assert_eq!(reduce(AggFunc::Sum, &empty).unwrap(), Value::Int64(0));
        assert_eq!(reduce(AggFunc::Mean, &empty).unwrap(), Value::Null);
        assert_eq!(reduce(AggFunc::Max, &empty).unwrap(), Value::Null);
        assert_eq!(reduce(AggFunc::First, &empty).unwrap(), Value::Null);
        assert_eq!(
            result_type(AggFunc::Max, &DataType::Utf8).unwrap(),
            DataType::Utf8
        );
    }
}
