//! Relational plans and their execution.
//!
//! A [`Plan`] is a tree of relational operators over in-memory tables. It
//! renders as one SQL query and runs on the shared Arrow kernels. Every
//! plan can also run on empty input, which is how output schemas are found
//! without touching data.

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::compute::concat;
use arrow::record_batch::RecordBatch;
use common_error::{TesseraError, TesseraResult};
use tessera_expr::expr::AggFunc;

use super::ast::{quote_ident, SqlExpr};
use crate::compute::aggregate::{reduce, result_type};
use crate::compute::scalar::to_array;
use crate::compute::selection::{self, broadcast};
use crate::compute::{arithmetic, elementwise, grouping};

/// One aggregation of a grouped query.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlAgg {
    pub expr: SqlExpr,
    pub output: String,
}

impl fmt::Display for SqlAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.expr, quote_ident(&self.output))
    }
}

/// Evaluate `expr` over the rows of `batch`. Plain aggregates and literals
/// give one row; everything else gives one row per input row.
pub fn evaluate(expr: &SqlExpr, batch: &RecordBatch) -> TesseraResult<ArrayRef> {
    match expr {
        SqlExpr::Column(name) => selection::column(batch, name),
        SqlExpr::Literal(value) => to_array(value, None),
        SqlExpr::Binary { op, left, right } => {
            arithmetic::binary(*op, &evaluate(left, batch)?, &evaluate(right, batch)?)
        }
        SqlExpr::Function { op, input } => elementwise::apply(&evaluate(input, batch)?, op),
        SqlExpr::Aggregate {
            func,
            input,
            window,
        } => {
            let row_level = input.has_bare_column();
            let value: ArrayRef = if *func == AggFunc::Len && !row_level {
                let rows = i64::try_from(batch.num_rows())
                    .map_err(|_| TesseraError::value_error("row count exceeds i64"))?;
                Arc::new(Int64Array::from(vec![rows]))
            } else {
                let mut input = evaluate(input, batch)?;
                if !row_level {
                    input = broadcast_to(input, batch.num_rows())?;
                }
                let dtype = result_type(*func, input.data_type())?;
                to_array(&reduce(*func, &input)?, Some(&dtype))?
            };
            if *window {
                broadcast(&value, batch.num_rows())
            } else {
                Ok(value)
            }
        }
        SqlExpr::Coalesce(left, right) => {
            elementwise::fill_null(&evaluate(left, batch)?, &evaluate(right, batch)?)
        }
        SqlExpr::Case {
            predicate,
            then,
            otherwise,
        } => elementwise::when_then(
            &evaluate(predicate, batch)?,
            &evaluate(then, batch)?,
            &evaluate(otherwise, batch)?,
        ),
        SqlExpr::Filter { input, predicate } => {
            let mask = evaluate(predicate, batch)?;
            let values = evaluate(input, batch)?;
            let values = if values.len() == 1 {
                broadcast(&values, mask.len())?
            } else {
                values
            };
            selection::filter_array(&values, &mask)
        }
        SqlExpr::Concat {
            left,
            right,
            separator,
        } => elementwise::str_concat(&evaluate(left, batch)?, &evaluate(right, batch)?, separator),
    }
}

/// A literal inside an aggregate stands for every row.
fn broadcast_to(array: ArrayRef, rows: usize) -> TesseraResult<ArrayRef> {
    if array.len() == 1 && rows != 1 {
        return broadcast(&array, rows);
    }
    Ok(array)
}

#[derive(Debug, Clone)]
pub enum Plan {
    Scan {
        name: Arc<str>,
        table: RecordBatch,
    },
    Project {
        input: Arc<Plan>,
        columns: Vec<(SqlExpr, String)>,
    },
    Filter {
        input: Arc<Plan>,
        predicate: SqlExpr,
    },
    Aggregate {
        input: Arc<Plan>,
        keys: Vec<String>,
        aggs: Vec<SqlAgg>,
        drop_null_keys: bool,
    },
    Sort {
        input: Arc<Plan>,
        by: Vec<String>,
        descending: Vec<bool>,
    },
    Limit {
        input: Arc<Plan>,
        n: usize,
    },
    /// `UNION ALL BY NAME`.
    Union { inputs: Vec<Arc<Plan>> },
    /// `POSITIONAL JOIN`.
    Positional { inputs: Vec<Arc<Plan>> },
}

impl Plan {
    /// Run the plan; with `empty`, every scanned table is empty.
    pub fn execute(&self, empty: bool) -> TesseraResult<RecordBatch> {
        match self {
            Self::Scan { table, .. } => Ok(if empty {
                table.slice(0, 0)
            } else {
                table.clone()
            }),
            Self::Project { input, columns } => {
                let batch = input.execute(empty)?;
                project(&batch, columns)
            }
            Self::Filter { input, predicate } => {
                let batch = input.execute(empty)?;
                let mask = broadcast(&evaluate(predicate, &batch)?, batch.num_rows())?;
                selection::filter_batch(&batch, &mask)
            }
            Self::Aggregate {
                input,
                keys,
                aggs,
                drop_null_keys,
            } => aggregate(&input.execute(empty)?, keys, aggs, *drop_null_keys),
            Self::Sort {
                input,
                by,
                descending,
            } => selection::sort_batch(&input.execute(empty)?, by, descending),
            Self::Limit { input, n } => Ok(selection::head_batch(&input.execute(empty)?, *n)),
            Self::Union { inputs } => {
                let batches = inputs
                    .iter()
                    .map(|plan| plan.execute(empty))
                    .collect::<TesseraResult<Vec<_>>>()?;
                selection::vstack(&batches)
            }
            Self::Positional { inputs } => {
                let batches = inputs
                    .iter()
                    .map(|plan| plan.execute(empty))
                    .collect::<TesseraResult<Vec<_>>>()?;
                selection::hstack(&batches)
            }
        }
    }
}

fn project(batch: &RecordBatch, columns: &[(SqlExpr, String)]) -> TesseraResult<RecordBatch> {
    let grouped = columns.iter().any(|(expr, _)| expr.is_aggregate());
    if grouped {
        if let Some((expr, _)) = columns.iter().find(|(expr, _)| expr.has_bare_column()) {
            return Err(TesseraError::InvalidAggregation(format!(
                "{expr} must be part of an aggregate function"
            )));
        }
    }
    let evaluated = columns
        .iter()
        .map(|(expr, name)| Ok((expr, name, evaluate(expr, batch)?)))
        .collect::<TesseraResult<Vec<_>>>()?;
    // Only columns reading the rows decide the height; the rest broadcast.
    let scalar_only =
        !columns.is_empty() && columns.iter().all(|(expr, _)| !expr.has_bare_column());
    let height = if grouped || scalar_only {
        1
    } else {
        evaluated
            .iter()
            .find(|(expr, _, _)| expr.has_bare_column())
            .map_or(batch.num_rows(), |(_, _, array)| array.len())
    };
    let arrays = evaluated
        .into_iter()
        .map(|(_, name, array)| Ok((name.clone(), broadcast(&array, height)?)))
        .collect::<TesseraResult<Vec<_>>>()?;
    selection::batch_of(arrays, height)
}

fn aggregate(
    batch: &RecordBatch,
    keys: &[String],
    aggs: &[SqlAgg],
    drop_null_keys: bool,
) -> TesseraResult<RecordBatch> {
    let groups = grouping::group_rows(batch, keys, drop_null_keys)?;
    let firsts = selection::positions(groups.iter().filter_map(|rows| rows.first().copied()))?;
    let mut columns = Vec::with_capacity(keys.len() + aggs.len());
    for key in keys {
        columns.push((key.clone(), selection::take_array(&selection::column(batch, key)?, &firsts)?));
    }
    for agg in aggs {
        let mut parts = Vec::with_capacity(groups.len());
        for rows in &groups {
            let group = selection::take_batch(batch, &selection::positions(rows.iter().copied())?)?;
            let value = evaluate(&agg.expr, &group)?;
            if value.len() != 1 {
                return Err(TesseraError::InvalidAggregation(format!(
                    "{} does not reduce to one value per group",
                    agg.expr
                )));
            }
            parts.push(value);
        }
        let array = if parts.is_empty() {
            let empty = evaluate(&agg.expr, &batch.slice(0, 0))?;
            empty.slice(0, 0)
        } else {
            let refs: Vec<&dyn Array> = parts.iter().map(AsRef::as_ref).collect();
            concat(&refs)?
        };
        columns.push((agg.output.clone(), array));
    }
    selection::batch_of(columns, groups.len())
}

fn join_columns(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan { name, .. } => write!(f, "SELECT * FROM {}", quote_ident(name)),
            Self::Project { input, columns } => {
                f.write_str("SELECT ")?;
                for (i, (expr, name)) in columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{expr} AS {}", quote_ident(name))?;
                }
                write!(f, " FROM ({input})")
            }
            Self::Filter { input, predicate } => {
                write!(f, "SELECT * FROM ({input}) WHERE {predicate}")
            }
            Self::Aggregate {
                input,
                keys,
                aggs,
                drop_null_keys,
            } => {
                let mut select: Vec<String> = keys.iter().map(|k| quote_ident(k)).collect();
                select.extend(aggs.iter().map(ToString::to_string));
                write!(f, "SELECT {} FROM ({input})", select.join(", "))?;
                if *drop_null_keys && !keys.is_empty() {
                    let filters: Vec<String> = keys
                        .iter()
                        .map(|k| format!("{} IS NOT NULL", quote_ident(k)))
                        .collect();
                    write!(f, " WHERE {}", filters.join(" AND "))?;
                }
                if !keys.is_empty() {
                    write!(f, " GROUP BY {}", join_columns(keys))?;
                }
                Ok(())
            }
            Self::Sort {
                input,
                by,
                descending,
            } => {
                let order: Vec<String> = by
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let desc = descending.get(i).or(descending.last()).copied().unwrap_or(false);
                        let direction = if desc { "DESC" } else { "ASC" };
                        format!("{} {direction} NULLS LAST", quote_ident(name))
                    })
                    .collect();
                write!(f, "SELECT * FROM ({input}) ORDER BY {}", order.join(", "))
            }
            Self::Limit { input, n } => write!(f, "SELECT * FROM ({input}) LIMIT {n}"),
            Self::Union { inputs } => {
                let parts: Vec<String> = inputs.iter().map(|p| format!("({p})")).collect();
                f.write_str(&parts.join(" UNION ALL BY NAME "))
            }
            Self::Positional { inputs } => {
                let parts: Vec<String> = inputs.iter().map(|p| format!("({p})")).collect();
                write!(f, "SELECT * FROM {}", parts.join(" POSITIONAL JOIN "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::StringArray;
    use tessera_core::Value;
    use tessera_expr::expr::{BinaryOp, Elementwise};

    use super::*;

    fn scan() -> Arc<Plan> {
        let table = selection::batch_of(
            vec![
                ("k".into(), Arc::new(StringArray::from(vec!["x", "y", "x"])) as ArrayRef),
                ("v".into(), Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            ],
            3,
        )
        .unwrap();
        Arc::new(Plan::Scan {
            name: Arc::from("df"),
            table,
        })
    }

    fn v() -> SqlExpr {
        SqlExpr::column("v")
    }

    #[test]
    fn test_grouped_pushdown() {
        let plan = Plan::Aggregate {
            input: scan(),
            keys: vec!["k".into()],
            aggs: vec![SqlAgg {
                expr: SqlExpr::aggregate(
                    AggFunc::Mean,
                    SqlExpr::binary(BinaryOp::Mul, v(), SqlExpr::Literal(Value::Int64(2))),
                ),
                output: "m".into(),
            }],
            drop_null_keys: false,
        };
        assert_eq!(
            plan.to_string(),
            "SELECT \"k\", mean((\"v\" * 2)) AS \"m\" FROM (SELECT * FROM \"df\") GROUP BY \"k\""
        );
        let out = plan.execute(false).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column(1).data_type(), &arrow::datatypes::DataType::Float64);
        assert_eq!(plan.execute(true).unwrap().num_rows(), 0);
    }

    #[test]
    fn test_non_aggregate_in_group_by_fails() {
        let plan = Plan::Aggregate {
            input: scan(),
            keys: vec!["k".into()],
            aggs: vec![SqlAgg {
                expr: SqlExpr::function(Elementwise::Abs, v()),
                output: "v".into(),
            }],
            drop_null_keys: false,
        };
        assert!(plan.execute(false).unwrap_err().is_invalid_aggregation());
    }

    #[test]
    fn test_filtered_columns_and_aggregates() {
        let big = || SqlExpr::binary(BinaryOp::Gt, v(), SqlExpr::Literal(Value::Int64(1)));
        let kept = Plan::Project {
            input: scan(),
            columns: vec![(SqlExpr::filter(v(), big()), "v".into())],
        };
        let out = kept.execute(false).unwrap();
        assert_eq!(out.column(0).as_ref(), &Int64Array::from(vec![2, 3]) as &dyn Array);

        let counted = Plan::Project {
            input: scan(),
            columns: vec![
                (SqlExpr::aggregate(AggFunc::Len, SqlExpr::filter(v(), big())), "n".into()),
                (SqlExpr::aggregate(AggFunc::Sum, SqlExpr::filter(v(), big())), "s".into()),
            ],
        };
        assert_eq!(
            counted.to_string(),
            "SELECT count(*) FILTER (WHERE (\"v\" > 1)) AS \"n\", sum(\"v\") FILTER (WHERE \
             (\"v\" > 1)) AS \"s\" FROM (SELECT * FROM \"df\")"
        );
        let out = counted.execute(false).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column(0).as_ref(), &Int64Array::from(vec![2]) as &dyn Array);
        assert_eq!(out.column(1).as_ref(), &Int64Array::from(vec![5]) as &dyn Array);

        let case = Plan::Project {
            input: scan(),
            columns: vec![(
                SqlExpr::case(big(), v(), SqlExpr::Literal(Value::Int64(0))),
                "v".into(),
            )],
        };
        let out = case.execute(false).unwrap();
        assert_eq!(out.column(0).as_ref(), &Int64Array::from(vec![0, 2, 3]) as &dyn Array);
    }

    #[test]
    fn test_projection_windows_and_aggregates() {
        let centered = SqlExpr::binary(BinaryOp::Sub, v(), SqlExpr::aggregate(AggFunc::Sum, v()))
            .windowed();
        let rows = Plan::Project {
            input: scan(),
            columns: vec![(centered, "c".into())],
        };
        assert_eq!(rows.execute(false).unwrap().num_rows(), 3);

        let total = Plan::Project {
            input: scan(),
            columns: vec![
                (SqlExpr::aggregate(AggFunc::Len, v()), "len".into()),
                (SqlExpr::Literal(Value::Int64(1)), "one".into()),
            ],
        };
        let out = total.execute(false).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column(0).as_ref(), &Int64Array::from(vec![3]) as &dyn Array);

        let literal = Plan::Project {
            input: scan(),
            columns: vec![(SqlExpr::Literal(Value::Int64(1)), "one".into())],
        };
        assert_eq!(literal.execute(false).unwrap().num_rows(), 1);

        let mixed = Plan::Project {
            input: scan(),
            columns: vec![(v(), "v".into()), (SqlExpr::aggregate(AggFunc::Sum, v()), "s".into())],
        };
        assert!(mixed.execute(false).unwrap_err().is_invalid_aggregation());
    }
}
