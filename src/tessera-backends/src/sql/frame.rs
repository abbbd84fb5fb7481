//! Lazy relations.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use common_error::{TesseraError, TesseraResult};
use log::debug;
use tessera_core::{DType, Value};
use tessera_expr::compliant::{CompliantFrame, CompliantSeries, Reconciled};
use tessera_expr::expr::{AggFunc, Elementwise};

use super::ast::SqlExpr;
use super::dtypes::name_of;
use super::engine::{Plan, SqlAgg};
use super::series::{literal, SqlSeries};
use super::Sql;
use crate::columnar::ArrowFrame;

/// Name under which in-memory tables are scanned.
const TABLE: &str = "df";

/// A relation: a plan plus its output schema.
#[derive(Debug, Clone)]
pub struct SqlFrame {
    plan: Arc<Plan>,
    schema: SchemaRef,
}

impl SqlFrame {
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            plan: Arc::new(Plan::Scan {
                name: Arc::from(TABLE),
                table: batch,
            }),
        }
    }

    /// Wrap `plan`, running it on empty input to find the output schema.
    pub fn from_plan(plan: Plan) -> TesseraResult<Self> {
        let schema = plan.execute(true)?.schema();
        Ok(Self {
            plan: Arc::new(plan),
            schema,
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// The query this relation stands for.
    pub fn sql(&self) -> String {
        self.plan.to_string()
    }

    /// Run the query into an eager frame.
    pub fn collect(&self) -> TesseraResult<ArrowFrame> {
        Ok(ArrowFrame::new(self.to_batch()?))
    }

    fn input(&self) -> Arc<Plan> {
        Arc::clone(&self.plan)
    }

    fn series(&self, name: &str, expr: SqlExpr) -> SqlSeries {
        SqlSeries::new(name, expr, self.schema.clone())
    }

    fn project(&self, columns: Vec<(SqlExpr, String)>) -> TesseraResult<Self> {
        Self::from_plan(Plan::Project {
            input: self.input(),
            columns,
        })
    }

    fn check_column(&self, name: &str) -> TesseraResult<()> {
        self.schema
            .index_of(name)
            .map(|_| ())
            .map_err(|_| TesseraError::column_not_found(name))
    }
}

impl CompliantFrame<Sql> for SqlFrame {
    fn columns(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    fn column(&self, name: &str) -> TesseraResult<SqlSeries> {
        self.check_column(name)?;
        Ok(self.series(name, SqlExpr::column(name)))
    }

    fn dtype_of(&self, name: &str) -> TesseraResult<String> {
        let field = self
            .schema
            .field_with_name(name)
            .map_err(|_| TesseraError::column_not_found(name))?;
        name_of(field.data_type())
    }

    fn len_series(&self) -> TesseraResult<SqlSeries> {
        Ok(self.series(
            "len",
            SqlExpr::aggregate(AggFunc::Len, SqlExpr::Literal(Value::Null)),
        ))
    }

    fn literal(&self, value: &Value, dtype: Option<&DType>) -> TesseraResult<SqlSeries> {
        let lit = literal("literal", value, self.schema.clone());
        match dtype {
            Some(dtype) => lit.elementwise(&Elementwise::Cast(dtype.clone())),
            None => Ok(lit),
        }
    }

    fn from_series(&self, series: Vec<SqlSeries>) -> TesseraResult<Self> {
        let rows = series.iter().any(|s| !s.is_scalar());
        let columns = series
            .into_iter()
            .map(|s| {
                let name = s.name().to_string();
                let expr = s.into_expr();
                (if rows { expr.windowed() } else { expr }, name)
            })
            .collect();
        self.project(columns)
    }

    fn with_series(&self, series: Vec<SqlSeries>) -> TesseraResult<Self> {
        let mut columns: Vec<(SqlExpr, String)> = self
            .columns()
            .into_iter()
            .map(|name| (SqlExpr::column(name.as_str()), name))
            .collect();
        for s in series {
            let name = s.name().to_string();
            let expr = s.into_expr().windowed();
            match columns.iter_mut().find(|(_, n)| *n == name) {
                Some(slot) => slot.0 = expr,
                None => columns.push((expr, name)),
            }
        }
        self.project(columns)
    }

    fn filter_mask(&self, mask: &SqlSeries) -> TesseraResult<Self> {
        Self::from_plan(Plan::Filter {
            input: self.input(),
            predicate: mask.expr().clone().windowed(),
        })
    }

    fn reconcile_series(&self, series: &SqlSeries) -> TesseraResult<Reconciled<SqlSeries>> {
        if series.is_scalar() {
            Ok(Reconciled::Broadcast(series.clone()))
        } else {
            Ok(Reconciled::Column(series.clone()))
        }
    }

    fn group_and_aggregate(
        &self,
        keys: &[String],
        aggs: &[SqlAgg],
        drop_null_keys: bool,
    ) -> TesseraResult<Self> {
        for key in keys {
            self.check_column(key)?;
        }
        Self::from_plan(Plan::Aggregate {
            input: self.input(),
            keys: keys.to_vec(),
            aggs: aggs.to_vec(),
            drop_null_keys,
        })
    }

    fn concat_horizontal(frames: &[Self]) -> TesseraResult<Self> {
        Self::from_plan(Plan::Positional {
            inputs: frames.iter().map(Self::input).collect(),
        })
    }

    fn concat_vertical(frames: &[Self]) -> TesseraResult<Self> {
        Self::from_plan(Plan::Union {
            inputs: frames.iter().map(Self::input).collect(),
        })
    }

    fn sort(&self, by: &[String], descending: &[bool]) -> TesseraResult<Self> {
        Self::from_plan(Plan::Sort {
            input: self.input(),
            by: by.to_vec(),
            descending: descending.to_vec(),
        })
    }

    fn head(&self, n: usize) -> TesseraResult<Self> {
        Self::from_plan(Plan::Limit {
            input: self.input(),
            n,
        })
    }

    fn rename(&self, mapping: &BTreeMap<String, String>) -> TesseraResult<Self> {
        for name in mapping.keys() {
            self.check_column(name)?;
        }
        let columns = self
            .columns()
            .into_iter()
            .map(|name| {
                let output = mapping.get(&name).cloned().unwrap_or_else(|| name.clone());
                (SqlExpr::Column(name), output)
            })
            .collect();
        self.project(columns)
    }

    fn drop(&self, names: &[String]) -> TesseraResult<Self> {
        for name in names {
            self.check_column(name)?;
        }
        let columns = self
            .columns()
            .into_iter()
            .filter(|name| !names.contains(name))
            .map(|name| (SqlExpr::column(name.as_str()), name))
            .collect();
        self.project(columns)
    }

    fn to_batch(&self) -> TesseraResult<RecordBatch> {
        debug!("running query: {}", self.plan);
        self.plan.execute(false)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
    use tessera_expr::compliant::Reduced;
    use tessera_expr::expr::BinaryOp;

    use super::*;
    use crate::compute::selection;

    fn sample() -> SqlFrame {
        let batch = selection::batch_of(
            vec![
                ("a".into(), Arc::new(Int64Array::from(vec![1, 1, 2])) as ArrayRef),
                ("b".into(), Arc::new(Int64Array::from(vec![4, 5, 6])) as ArrayRef),
                ("s".into(), Arc::new(StringArray::from(vec!["x", "y", "z"])) as ArrayRef),
            ],
            3,
        )
        .unwrap();
        SqlFrame::new(batch)
    }

    #[test]
    fn test_schema_without_running() {
        let f = sample();
        let doubled = f
            .column("b")
            .unwrap()
            .binary(BinaryOp::Mul, &Reconciled::Scalar(Value::Float64(2.0)), false)
            .unwrap();
        let out = f.with_series(vec![doubled]).unwrap();
        assert_eq!(out.columns(), ["a", "b", "s"]);
        assert_eq!(out.dtype_of("b").unwrap(), "DOUBLE");
        assert_eq!(
            out.sql(),
            "SELECT \"a\" AS \"a\", (\"b\" * 2.0) AS \"b\", \"s\" AS \"s\" FROM (SELECT * FROM \"df\")"
        );
    }

    #[test]
    fn test_scalar_projection_is_one_row() {
        let f = sample();
        let Reduced::Deferred(total) = f.column("b").unwrap().reduce(AggFunc::Sum).unwrap() else {
            panic!("expected a deferred reduction");
        };
        let out = f
            .from_series(vec![total.clone(), f.len_series().unwrap()])
            .unwrap()
            .to_batch()
            .unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column(0).as_ref(), &Int64Array::from(vec![15]) as &dyn Array);
        assert_eq!(out.column(1).as_ref(), &Int64Array::from(vec![3]) as &dyn Array);

        let mixed = f
            .from_series(vec![f.column("a").unwrap(), total.rename("t")])
            .unwrap()
            .to_batch()
            .unwrap();
        assert_eq!(mixed.num_rows(), 3);
        assert_eq!(mixed.column(1).as_ref(), &Int64Array::from(vec![15, 15, 15]) as &dyn Array);
    }

    #[test]
    fn test_grouped_mean() {
        let f = sample();
        let agg = SqlAgg {
            expr: SqlExpr::aggregate(AggFunc::Mean, SqlExpr::column("b")),
            output: "b".into(),
        };
        let out = f
            .group_and_aggregate(&["a".to_string()], &[agg], false)
            .unwrap()
            .sort(&["a".to_string()], &[false])
            .unwrap()
            .to_batch()
            .unwrap();
        assert_eq!(out.column(1).as_ref(), &Float64Array::from(vec![4.5, 6.0]) as &dyn Array);
    }

    #[test]
    fn test_filter_head_and_collect() {
        let f = sample();
        let mask = f
            .column("b")
            .unwrap()
            .binary(BinaryOp::Gt, &Reconciled::Scalar(Value::Int64(4)), false)
            .unwrap();
        let out = f.filter_mask(&mask).unwrap().head(1).unwrap();
        assert!(out.sql().ends_with("WHERE (\"b\" > 4)) LIMIT 1"));
        let collected = out.collect().unwrap();
        assert_eq!(collected.height(), 1);
        assert_eq!(
            collected.batch().column(1).as_ref(),
            &Int64Array::from(vec![5]) as &dyn Array
        );
    }

    #[test]
    fn test_vertical_concat_mismatch() {
        let other = sample()
            .rename(&BTreeMap::from([("b".to_string(), "c".to_string())]))
            .unwrap();
        assert!(matches!(
            SqlFrame::concat_vertical(&[sample(), other]),
            Err(TesseraError::ColumnMismatch(_))
        ));
        assert!(matches!(
            sample().drop(&["zz".to_string()]),
            Err(TesseraError::ColumnNotFound(_))
        ));
    }
}
