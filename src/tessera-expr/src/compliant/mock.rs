//! A tiny integer-only backend for unit tests of the generic machinery.

use std::collections::BTreeMap;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::record_batch::RecordBatch;
use common_config::BackendKind;
use common_error::{TesseraError, TesseraResult};
use tessera_core::{DType, Value};

use super::comparand::{Reconciled, Reduced};
use super::traits::{AggregationStrategy, Backend, CompliantFrame, CompliantSeries};
use crate::expr::{AggFunc, BinaryOp, Elementwise, Reshape};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Mock;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockSeries {
    pub name: String,
    pub values: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockFrame {
    pub columns: Vec<MockSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockAgg {
    pub func: AggFunc,
    pub input: String,
    pub output: String,
}

pub(crate) fn series(name: &str, values: &[i64]) -> MockSeries {
    MockSeries {
        name: name.to_string(),
        values: values.iter().copied().map(Some).collect(),
    }
}

pub(crate) fn frame(columns: &[(&str, &[i64])]) -> MockFrame {
    MockFrame {
        columns: columns.iter().map(|(name, values)| series(name, values)).collect(),
    }
}

fn unsupported(what: &str) -> TesseraError {
    TesseraError::not_implemented(format!("{what} on the mock backend"))
}

fn apply(op: BinaryOp, l: i64, r: i64) -> TesseraResult<i64> {
    Ok(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::TrueDiv | BinaryOp::FloorDiv => l.checked_div(r).ok_or_else(|| {
            TesseraError::execution("division by zero")
        })?,
        BinaryOp::Mod => {
            let rem = l
                .checked_rem(r)
                .ok_or_else(|| TesseraError::execution("modulo by zero"))?;
            if rem != 0 && ((rem < 0) != (r < 0)) {
                rem + r
            } else {
                rem
            }
        }
        BinaryOp::Pow => l.pow(u32::try_from(r).unwrap_or(0)),
        BinaryOp::Eq => i64::from(l == r),
        BinaryOp::NotEq => i64::from(l != r),
        BinaryOp::Lt => i64::from(l < r),
        BinaryOp::LtEq => i64::from(l <= r),
        BinaryOp::Gt => i64::from(l > r),
        BinaryOp::GtEq => i64::from(l >= r),
        BinaryOp::And => i64::from(l != 0 && r != 0),
        BinaryOp::Or => i64::from(l != 0 || r != 0),
    })
}

impl Backend for Mock {
    type Frame = MockFrame;
    type Series = MockSeries;
    type Dtype = String;
    type DtypeContext = ();
    type AggExpr = MockAgg;

    const KIND: BackendKind = BackendKind::Columnar;
    const AGGREGATION_NAMES: &'static [(&'static str, &'static str)] = &[("len", "size")];
    const AGGREGATION_STRATEGY: AggregationStrategy = AggregationStrategy::SimpleOnly;

    fn to_logical(native: &String) -> DType {
        if native == "i64" {
            DType::Int64
        } else {
            DType::Unknown
        }
    }

    fn from_logical(dtype: &DType, _context: &()) -> TesseraResult<String> {
        match dtype {
            DType::Int64 => Ok("i64".to_string()),
            other => Err(TesseraError::unsupported_dtype(other, "mock")),
        }
    }

    fn aggregation(func: AggFunc, input: &str, output: &str) -> TesseraResult<MockAgg> {
        Ok(MockAgg {
            func,
            input: input.to_string(),
            output: output.to_string(),
        })
    }

    fn series_from_array(name: &str, array: ArrayRef) -> TesseraResult<MockSeries> {
        let ints = array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| TesseraError::type_error("mock series hold Int64 only"))?;
        Ok(MockSeries {
            name: name.to_string(),
            values: ints.iter().collect(),
        })
    }
}

impl CompliantSeries<Mock> for MockSeries {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: self.values.clone(),
        }
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.values.len())
    }

    fn is_scalar(&self) -> bool {
        self.values.len() == 1
    }

    fn dtype(&self) -> TesseraResult<String> {
        Ok("i64".to_string())
    }

    fn reconcile_series(&self, other: &Self) -> TesseraResult<Reconciled<Self>> {
        if other.values.len() == 1 && self.values.len() != 1 {
            return Ok(Reconciled::Scalar(other.values[0].map_or(Value::Null, Value::Int64)));
        }
        Ok(Reconciled::Column(other.clone()))
    }

    fn binary(&self, op: BinaryOp, other: &Reconciled<Self>, reflected: bool) -> TesseraResult<Self> {
        let rhs: Vec<Option<i64>> = match other {
            Reconciled::Scalar(value) => vec![value.as_int64(); self.values.len()],
            Reconciled::Column(s) | Reconciled::Broadcast(s) => s.values.clone(),
            Reconciled::Unsupported => return Err(TesseraError::type_error("unsupported operand")),
        };
        let lhs: Vec<Option<i64>> = if self.values.len() == 1 && rhs.len() != 1 {
            vec![self.values[0]; rhs.len()]
        } else {
            self.values.clone()
        };
        if lhs.len() != rhs.len() {
            return Err(TesseraError::value_error("length mismatch"));
        }
        let values = lhs
            .iter()
            .zip(&rhs)
            .map(|(l, r)| match (l, r) {
                (Some(l), Some(r)) if reflected => apply(op, *r, *l).map(Some),
                (Some(l), Some(r)) => apply(op, *l, *r).map(Some),
                _ => Ok(None),
            })
            .collect::<TesseraResult<_>>()?;
        Ok(Self {
            name: self.name.clone(),
            values,
        })
    }

    fn elementwise(&self, op: &Elementwise) -> TesseraResult<Self> {
        let values = match op {
            Elementwise::Neg => self.values.iter().map(|v| v.map(|v| -v)).collect(),
            Elementwise::Abs => self.values.iter().map(|v| v.map(i64::abs)).collect(),
            Elementwise::Round(_) | Elementwise::Cast(DType::Int64) => self.values.clone(),
            Elementwise::IsNull => self.values.iter().map(|v| Some(i64::from(v.is_none()))).collect(),
            Elementwise::IsNotNull => {
                self.values.iter().map(|v| Some(i64::from(v.is_some()))).collect()
            }
            other => return Err(unsupported(other.label())),
        };
        Ok(Self {
            name: self.name.clone(),
            values,
        })
    }

    fn reduce(&self, func: AggFunc) -> TesseraResult<Reduced<Self>> {
        let valid: Vec<i64> = self.values.iter().flatten().copied().collect();
        let len = i64::try_from(valid.len()).unwrap_or(i64::MAX);
        let value = match func {
            AggFunc::Sum => Value::Int64(valid.iter().sum()),
            AggFunc::Min => valid.iter().min().map_or(Value::Null, |v| Value::Int64(*v)),
            AggFunc::Max => valid.iter().max().map_or(Value::Null, |v| Value::Int64(*v)),
            AggFunc::Mean if len > 0 => Value::Int64(valid.iter().sum::<i64>() / len),
            AggFunc::Count => Value::Int64(len),
            AggFunc::Len => Value::Int64(i64::try_from(self.values.len()).unwrap_or(i64::MAX)),
            other => return Err(unsupported(other.name())),
        };
        Ok(Reduced::Value(value))
    }

    fn from_scalar(value: Reduced<Self>, like: &Self) -> TesseraResult<Self> {
        match value {
            Reduced::Value(value) => Ok(Self {
                name: like.name.clone(),
                values: vec![value.as_int64()],
            }),
            Reduced::Deferred(series) => Ok(series.rename(&like.name)),
        }
    }

    fn fill_null(&self, value: &Reconciled<Self>) -> TesseraResult<Self> {
        let Reconciled::Scalar(fill) = value else {
            return Err(unsupported("fill_null with a column"));
        };
        Ok(Self {
            name: self.name.clone(),
            values: self.values.iter().map(|v| v.or(fill.as_int64())).collect(),
        })
    }

    fn filter(&self, mask: &Self) -> TesseraResult<Self> {
        Ok(Self {
            name: self.name.clone(),
            values: self
                .values
                .iter()
                .zip(&mask.values)
                .filter(|(_, keep)| **keep == Some(1))
                .map(|(v, _)| *v)
                .collect(),
        })
    }

    fn zip_with(&self, mask: &Self, other: &Reconciled<Self>) -> TesseraResult<Self> {
        let len = mask.values.len().max(self.values.len());
        let at = |values: &[Option<i64>], row: usize| match values {
            [only] => *only,
            many => many.get(row).copied().flatten(),
        };
        let other: Vec<Option<i64>> = match other {
            Reconciled::Scalar(value) => vec![value.as_int64()],
            Reconciled::Column(s) | Reconciled::Broadcast(s) => s.values.clone(),
            Reconciled::Unsupported => return Err(TesseraError::type_error("unsupported operand")),
        };
        let values = (0..len)
            .map(|row| {
                if at(&mask.values, row) == Some(1) {
                    at(&self.values, row)
                } else {
                    at(&other, row)
                }
            })
            .collect();
        Ok(Self {
            name: self.name.clone(),
            values,
        })
    }

    fn reshape(&self, op: Reshape) -> TesseraResult<Self> {
        let values = match op {
            Reshape::Head(n) => self.values.iter().take(n).copied().collect(),
            Reshape::Tail(n) => {
                let skip = self.values.len().saturating_sub(n);
                self.values[skip..].to_vec()
            }
            other => return Err(unsupported(other.label())),
        };
        Ok(Self {
            name: self.name.clone(),
            values,
        })
    }

    fn str_concat(&self, _other: &Self, _separator: &str) -> TesseraResult<Self> {
        Err(unsupported("concat_str"))
    }
}

impl MockFrame {
    fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }
}

impl CompliantFrame<Mock> for MockFrame {
    fn columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn column(&self, name: &str) -> TesseraResult<MockSeries> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| TesseraError::column_not_found(name))
    }

    fn dtype_of(&self, name: &str) -> TesseraResult<String> {
        self.column(name).map(|_| "i64".to_string())
    }

    fn len_series(&self) -> TesseraResult<MockSeries> {
        Ok(series("len", &[i64::try_from(self.height()).unwrap_or(i64::MAX)]))
    }

    fn literal(&self, value: &Value, _dtype: Option<&DType>) -> TesseraResult<MockSeries> {
        Ok(MockSeries {
            name: "literal".to_string(),
            values: vec![value.as_int64()],
        })
    }

    fn from_series(&self, series: Vec<MockSeries>) -> TesseraResult<Self> {
        let height = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
        let columns = series
            .into_iter()
            .map(|s| match s.values.len() {
                n if n == height => Ok(s),
                1 => Ok(MockSeries {
                    values: vec![s.values[0]; height],
                    name: s.name,
                }),
                _ => Err(TesseraError::value_error("length mismatch")),
            })
            .collect::<TesseraResult<_>>()?;
        Ok(Self { columns })
    }

    fn with_series(&self, series: Vec<MockSeries>) -> TesseraResult<Self> {
        let mut columns = self.columns.clone();
        for s in series {
            let s = match self.reconcile_series(&s)? {
                Reconciled::Scalar(value) => MockSeries {
                    name: s.name,
                    values: vec![value.as_int64(); self.height()],
                },
                _ => s,
            };
            match columns.iter_mut().find(|c| c.name == s.name) {
                Some(existing) => *existing = s,
                None => columns.push(s),
            }
        }
        Ok(Self { columns })
    }

    fn filter_mask(&self, mask: &MockSeries) -> TesseraResult<Self> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.filter(mask))
            .collect::<TesseraResult<_>>()?;
        Ok(Self { columns })
    }

    fn reconcile_series(&self, series: &MockSeries) -> TesseraResult<Reconciled<MockSeries>> {
        match series.values.len() {
            n if n == self.height() => Ok(Reconciled::Column(series.clone())),
            1 => Ok(Reconciled::Scalar(series.values[0].map_or(Value::Null, Value::Int64))),
            n => Err(TesseraError::value_error(format!(
                "series of length {n} does not match frame height {}",
                self.height()
            ))),
        }
    }

    fn group_and_aggregate(
        &self,
        keys: &[String],
        aggs: &[MockAgg],
        _drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        let key_columns = keys
            .iter()
            .map(|k| self.column(k))
            .collect::<TesseraResult<Vec<_>>>()?;
        let mut groups: Vec<(Vec<Option<i64>>, Vec<usize>)> = Vec::new();
        for row in 0..self.height() {
            let key: Vec<Option<i64>> = key_columns.iter().map(|c| c.values[row]).collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, rows)) => rows.push(row),
                None => groups.push((key, vec![row])),
            }
        }
        let mut columns: Vec<MockSeries> = keys
            .iter()
            .enumerate()
            .map(|(i, name)| MockSeries {
                name: name.clone(),
                values: groups.iter().map(|(k, _)| k[i]).collect(),
            })
            .collect();
        for agg in aggs {
            let input = self.column(&agg.input)?;
            let mut values = Vec::with_capacity(groups.len());
            for (_, rows) in &groups {
                let part = MockSeries {
                    name: agg.input.clone(),
                    values: rows.iter().map(|r| input.values[*r]).collect(),
                };
                match part.reduce(agg.func)? {
                    Reduced::Value(v) => values.push(v.as_int64()),
                    Reduced::Deferred(_) => return Err(unsupported("deferred reduction")),
                }
            }
            columns.push(MockSeries {
                name: agg.output.clone(),
                values,
            });
        }
        Ok(Self { columns })
    }

    fn concat_horizontal(_frames: &[Self]) -> TesseraResult<Self> {
        Err(unsupported("concat_horizontal"))
    }

    fn concat_vertical(_frames: &[Self]) -> TesseraResult<Self> {
        Err(unsupported("concat_vertical"))
    }

    fn sort(&self, _by: &[String], _descending: &[bool]) -> TesseraResult<Self> {
        Err(unsupported("sort"))
    }

    fn head(&self, _n: usize) -> TesseraResult<Self> {
        Err(unsupported("head"))
    }

    fn rename(&self, _mapping: &BTreeMap<String, String>) -> TesseraResult<Self> {
        Err(unsupported("rename"))
    }

    fn drop(&self, _names: &[String]) -> TesseraResult<Self> {
        Err(unsupported("drop"))
    }

    fn to_batch(&self) -> TesseraResult<RecordBatch> {
        Err(unsupported("to_batch"))
    }
}
