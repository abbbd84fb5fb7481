//! Columns of a relation, as SQL expressions.

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use common_error::{TesseraError, TesseraResult};
use tessera_core::Value;
use tessera_expr::compliant::{CompliantSeries, Reconciled, Reduced};
use tessera_expr::expr::{AggFunc, BinaryOp, Elementwise, Reshape};

use super::ast::SqlExpr;
use super::dtypes::name_of;
use super::engine::evaluate;
use super::Sql;

/// A named expression over the columns of `schema`. Nothing is computed
/// until the frame holding it runs its plan.
#[derive(Debug, Clone)]
pub struct SqlSeries {
    name: String,
    expr: SqlExpr,
    schema: SchemaRef,
}

impl SqlSeries {
    pub(crate) fn new(name: impl Into<String>, expr: SqlExpr, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            expr,
            schema,
        }
    }

    pub fn expr(&self) -> &SqlExpr {
        &self.expr
    }

    pub(crate) fn into_expr(self) -> SqlExpr {
        self.expr
    }

    /// The output type, found by running the expression on no rows.
    pub fn data_type(&self) -> TesseraResult<arrow::datatypes::DataType> {
        let empty = RecordBatch::new_empty(self.schema.clone());
        Ok(evaluate(&self.expr, &empty)?.data_type().clone())
    }

    /// Same name and input, new expression; type errors surface here rather
    /// than when the query runs.
    fn derived(&self, expr: SqlExpr) -> TesseraResult<Self> {
        let out = Self::new(self.name.clone(), expr, self.schema.clone());
        out.data_type()?;
        Ok(out)
    }

    /// The right-hand expression of a binary operation; one-value operands
    /// next to row-level ones become window aggregates.
    fn operand(&self, other: &Reconciled<Self>, what: &str) -> TesseraResult<(SqlExpr, SqlExpr)> {
        let rhs = match other {
            Reconciled::Scalar(value) => {
                return Ok((self.expr.clone(), SqlExpr::Literal(value.clone())))
            }
            Reconciled::Broadcast(series) | Reconciled::Column(series) => series,
            Reconciled::Unsupported => {
                return Err(TesseraError::type_error(format!(
                    "unsupported operand for `{what}`"
                )))
            }
        };
        if self.is_scalar() == rhs.is_scalar() {
            Ok((self.expr.clone(), rhs.expr.clone()))
        } else {
            Ok((self.expr.clone().windowed(), rhs.expr.clone().windowed()))
        }
    }
}

impl CompliantSeries<Sql> for SqlSeries {
    fn name(&self) -> &str {
        &self.name
    }

    fn rename(&self, name: &str) -> Self {
        Self::new(name, self.expr.clone(), self.schema.clone())
    }

    fn len_hint(&self) -> Option<usize> {
        None
    }

    fn is_scalar(&self) -> bool {
        !self.expr.has_bare_column()
    }

    fn dtype(&self) -> TesseraResult<String> {
        name_of(&self.data_type()?)
    }

    fn reconcile_series(&self, other: &Self) -> TesseraResult<Reconciled<Self>> {
        if other.is_scalar() {
            Ok(Reconciled::Broadcast(other.clone()))
        } else {
            Ok(Reconciled::Column(other.clone()))
        }
    }

    fn binary(&self, op: BinaryOp, other: &Reconciled<Self>, reflected: bool) -> TesseraResult<Self> {
        let (lhs, rhs) = self.operand(other, op.label())?;
        let expr = if reflected {
            SqlExpr::binary(op, rhs, lhs)
        } else {
            SqlExpr::binary(op, lhs, rhs)
        };
        self.derived(expr)
    }

    fn elementwise(&self, op: &Elementwise) -> TesseraResult<Self> {
        self.derived(SqlExpr::function(op.clone(), self.expr.clone()))
    }

    fn reduce(&self, func: AggFunc) -> TesseraResult<Reduced<Self>> {
        Ok(Reduced::Deferred(
            self.derived(SqlExpr::aggregate(func, self.expr.clone()))?,
        ))
    }

    fn from_scalar(value: Reduced<Self>, like: &Self) -> TesseraResult<Self> {
        match value {
            Reduced::Value(value) => Ok(Self::new(
                like.name.clone(),
                SqlExpr::Literal(value),
                like.schema.clone(),
            )),
            Reduced::Deferred(series) => Ok(series.rename(&like.name)),
        }
    }

    fn fill_null(&self, value: &Reconciled<Self>) -> TesseraResult<Self> {
        let (lhs, rhs) = self.operand(value, "fill_null")?;
        self.derived(SqlExpr::Coalesce(Box::new(lhs), Box::new(rhs)))
    }

    fn filter(&self, mask: &Self) -> TesseraResult<Self> {
        let (input, predicate) = self.operand(&Reconciled::Column(mask.clone()), "filter")?;
        self.derived(SqlExpr::filter(input, predicate))
    }

    fn zip_with(&self, mask: &Self, other: &Reconciled<Self>) -> TesseraResult<Self> {
        let otherwise = match other {
            Reconciled::Scalar(value) => (SqlExpr::Literal(value.clone()), true),
            Reconciled::Broadcast(series) | Reconciled::Column(series) => {
                (series.expr.clone(), series.is_scalar())
            }
            Reconciled::Unsupported => {
                return Err(TesseraError::type_error("unsupported operand for `when`"))
            }
        };
        let parts = [
            (mask.expr.clone(), mask.is_scalar()),
            (self.expr.clone(), self.is_scalar()),
            otherwise,
        ];
        let mixed =
            parts.iter().any(|(_, scalar)| *scalar) && parts.iter().any(|(_, scalar)| !scalar);
        let [predicate, then, otherwise] =
            parts.map(|(expr, _)| if mixed { expr.windowed() } else { expr });
        self.derived(SqlExpr::case(predicate, then, otherwise))
    }

    fn reshape(&self, op: Reshape) -> TesseraResult<Self> {
        Err(TesseraError::not_implemented(format!(
            "`{}` on the sql backend",
            op.label()
        )))
    }

    fn str_concat(&self, other: &Self, separator: &str) -> TesseraResult<Self> {
        let (lhs, rhs) = self.operand(&Reconciled::Column(other.clone()), "concat_str")?;
        self.derived(SqlExpr::Concat {
            left: Box::new(lhs),
            right: Box::new(rhs),
            separator: separator.to_string(),
        })
    }
}

/// A literal column over `schema`.
pub(crate) fn literal(name: &str, value: &Value, schema: SchemaRef) -> SqlSeries {
    SqlSeries::new(name, SqlExpr::Literal(value.clone()), schema)
}

/// Arrays cannot be embedded in a query.
pub(crate) fn from_array(name: &str, _array: ArrayRef) -> TesseraResult<SqlSeries> {
    Err(TesseraError::not_implemented(format!(
        "series `{name}` from an in-memory array on the sql backend"
    )))
}
