//! Frame-level operations written once against the compliant traits.

use common_error::{TesseraError, TesseraResult};

use super::comparand::Comparand;
use super::namespace::Namespace;
use super::node::CompliantExpr;
use super::traits::{Backend, CompliantFrame, CompliantSeries};
use crate::expr::{BinaryOp, HorizontalOp};

fn evaluate_all<B: Backend>(
    frame: &B::Frame,
    exprs: &[CompliantExpr<B>],
) -> TesseraResult<Vec<B::Series>> {
    let mut series = Vec::new();
    for expr in exprs {
        series.extend(expr.evaluate(frame)?);
    }
    Ok(series)
}

/// Evaluate `exprs` into a new frame, in order.
pub fn select<B: Backend>(frame: &B::Frame, exprs: &[CompliantExpr<B>]) -> TesseraResult<B::Frame> {
    match exprs {
        [expr] => frame.select_by_expression(expr),
        _ => frame.from_series(evaluate_all(frame, exprs)?),
    }
}

/// Add or replace columns.
pub fn with_columns<B: Backend>(
    frame: &B::Frame,
    exprs: &[CompliantExpr<B>],
) -> TesseraResult<B::Frame> {
    frame.with_series(evaluate_all(frame, exprs)?)
}

/// Keep the rows where every predicate holds.
pub fn filter<B: Backend>(
    frame: &B::Frame,
    predicates: Vec<CompliantExpr<B>>,
    ns: &Namespace<B>,
) -> TesseraResult<B::Frame> {
    match predicates.len() {
        0 => Err(TesseraError::value_error(
            "filter requires at least one predicate",
        )),
        1 => frame.filter_by_boolean_expression(&predicates[0]),
        _ => frame.filter_by_boolean_expression(&ns.horizontal(HorizontalOp::All, predicates)?),
    }
}

/// Apply `op` to every column of `frame` against `other`, reconciled in
/// the frame context. `reflected` puts the columns on the right.
pub fn frame_binary<B: Backend>(
    frame: &B::Frame,
    op: BinaryOp,
    other: &Comparand<B>,
    reflected: bool,
) -> TesseraResult<B::Frame> {
    let rhs = frame.reconcile(other)?;
    if rhs.is_unsupported() {
        return Err(TesseraError::type_error(format!(
            "unsupported operand for `{}` between two frames",
            op.label()
        )));
    }
    let columns = frame
        .columns()
        .iter()
        .map(|name| frame.column(name)?.binary(op, &rhs, reflected))
        .collect::<TesseraResult<Vec<_>>>()?;
    frame.from_series(columns)
}

#[cfg(test)]
mod tests {
    use tessera_core::Value;

    use super::*;
    use crate::compliant::mock::{frame, series, Mock, MockFrame};
    use crate::compliant::{parse_into_exprs, Reconciled};
    use crate::expr::col;
    use crate::ExprArgs;

    fn ns() -> Namespace<Mock> {
        Namespace::new()
    }

    fn sample() -> MockFrame {
        frame(&[("a", &[0, 1, 2]), ("b", &[4, 5, 6]), ("z", &[7, 8, 9])])
    }

    #[test]
    fn test_select_preserves_order() {
        let args = ExprArgs::from([col("z"), col("a") * 2]).named("extra", col("a") - 1);
        let exprs = parse_into_exprs(args, &ns()).unwrap();
        let out = select(&sample(), &exprs).unwrap();
        let names: Vec<_> = out.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["z", "a", "extra"]);
        assert_eq!(out.columns[2].values, vec![Some(-1), Some(0), Some(1)]);
    }

    #[test]
    fn test_select_comparison() {
        let exprs = parse_into_exprs(ExprArgs::from(col("a").gt(1)), &ns()).unwrap();
        let out = select(&sample(), &exprs).unwrap();
        assert_eq!(out.columns[0].name, "a");
        assert_eq!(out.columns[0].values, vec![Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn test_with_columns_broadcasts_scalars() {
        let args = ExprArgs::new().named("b_sum", col("b").sum()).arg(col("a") + 1);
        let exprs = parse_into_exprs(args, &ns()).unwrap();
        let out = with_columns(&sample(), &exprs).unwrap();
        let names: Vec<_> = out.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "z", "b_sum"]);
        assert_eq!(out.columns[0].values, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(out.columns[3].values, vec![Some(15); 3]);
    }

    #[test]
    fn test_filter_combines_predicates() {
        let preds = parse_into_exprs(ExprArgs::from([col("a").gt(0), col("b").lt(6)]), &ns())
            .unwrap();
        let out = filter(&sample(), preds, &ns()).unwrap();
        assert_eq!(out.columns[0].values, vec![Some(1)]);
    }

    #[test]
    fn test_frame_context_reconcile() {
        let f = sample();
        let scalar = f.reconcile(&Comparand::Series(series("s", &[3]))).unwrap();
        assert!(matches!(scalar, Reconciled::Scalar(Value::Int64(3))));
        let column = f.reconcile(&Comparand::Series(series("s", &[1, 2, 3]))).unwrap();
        assert!(matches!(column, Reconciled::Column(_)));
        let unsupported = f.reconcile(&Comparand::Frame(f.clone())).unwrap();
        assert!(unsupported.is_unsupported());
        let err = f.reconcile(&Comparand::Exprs(Vec::new())).unwrap_err();
        assert!(matches!(err, TesseraError::InternalConsistency(_)));
        let err = f
            .reconcile(&Comparand::Exprs(vec![series("x", &[1]), series("y", &[1])]))
            .unwrap_err();
        assert!(matches!(err, TesseraError::MultiOutputNotSupported(_)));
    }

    #[test]
    fn test_frame_binary_reflected() {
        let f = frame(&[("a", &[1, 2])]);
        let ten = Comparand::Scalar(Value::Int64(10));
        let out = frame_binary::<Mock>(&f, BinaryOp::Sub, &ten, true).unwrap();
        assert_eq!(out.columns[0].values, vec![Some(9), Some(8)]);
    }
}
