//! Translation of neutral [`Expr`] trees into backend nodes.

use common_error::{TesseraError, TesseraResult};
use log::debug;

use super::namespace::Namespace;
use super::node::{CompliantExpr, ExprOperand};
use super::traits::Backend;
use crate::expr::{Expr, Function, Operand, SeriesRef};

/// Recover the native series behind a handle, checking its backend.
pub fn native_series<B: Backend>(series: &SeriesRef) -> TesseraResult<B::Series> {
    if series.kind() != B::KIND {
        return Err(TesseraError::type_error(format!(
            "series `{}` belongs to the {} backend and cannot be combined with {} data",
            series.name(),
            series.kind(),
            B::KIND
        )));
    }
    series.downcast::<B::Series>().ok_or_else(|| {
        TesseraError::consistency(format!(
            "series `{}` is tagged {} but holds a foreign native type",
            series.name(),
            B::KIND
        ))
    })
}

fn operand<B: Backend>(operand: &Operand, ns: &Namespace<B>) -> TesseraResult<ExprOperand<B>> {
    Ok(match operand {
        Operand::Expr(expr) => ExprOperand::Expr(to_compliant(expr, ns)?),
        Operand::Series(series) => ExprOperand::Series(native_series::<B>(series)?),
        Operand::Scalar(value) => ExprOperand::Scalar(value.clone()),
    })
}

fn take_operand<B: Backend>(
    operands: &mut Vec<(String, ExprOperand<B>)>,
    name: &str,
    function: &Function,
) -> TesseraResult<ExprOperand<B>> {
    let position = operands.iter().position(|(n, _)| n == name).ok_or_else(|| {
        TesseraError::type_error(format!(
            "`{}` is missing its `{name}` argument",
            function.label()
        ))
    })?;
    Ok(operands.remove(position).1)
}

/// Translate `expr` into a node of backend `B`.
pub fn to_compliant<B: Backend>(expr: &Expr, ns: &Namespace<B>) -> TesseraResult<CompliantExpr<B>> {
    match expr {
        Expr::Column(names) => ns.col(names.iter().cloned()),
        Expr::All => ns.all(),
        Expr::Literal { value, dtype } => ns.lit(value.clone(), dtype.clone()),
        Expr::Len => ns.len(),
        Expr::Selector(selector) => ns.selector(selector.clone()),
        Expr::Series(series) => ns.series(native_series::<B>(series)?),
        Expr::Function {
            input,
            function,
            operands,
        } => {
            let input = to_compliant(input, ns)?;
            let mut operands = operands
                .iter()
                .map(|(name, op)| Ok((name.clone(), operand(op, ns)?)))
                .collect::<TesseraResult<Vec<_>>>()?;
            let node = match function {
                Function::Binary(op) => {
                    input.binary(*op, take_operand(&mut operands, "other", function)?)
                }
                Function::Agg(func) => input.reduce(*func),
                Function::Elementwise(op) => input.elementwise(op.clone()),
                Function::Reshape(op) => input.reshape(*op),
                Function::FillNull => {
                    input.fill_null(take_operand(&mut operands, "value", function)?)
                }
                Function::Filter => {
                    input.filter(take_operand(&mut operands, "predicate", function)?)
                }
                Function::When => {
                    let predicate = take_operand(&mut operands, "predicate", function)?;
                    let otherwise = take_operand(&mut operands, "otherwise", function)?;
                    input.when_then(predicate, otherwise)
                }
                Function::IsBetween(closed) => {
                    let lower = take_operand(&mut operands, "lower_bound", function)?;
                    let upper = take_operand(&mut operands, "upper_bound", function)?;
                    input.is_between(lower, upper, *closed)
                }
            }?;
            debug!("translated `{}` for {}", node.function_name(), B::KIND);
            Ok(node)
        }
        Expr::Alias { input, name } => to_compliant(input, ns)?.alias(name),
        Expr::Name { input, op } => to_compliant(input, ns)?.map_names(op),
        Expr::Horizontal { op, inputs } => {
            let inputs = translate_all(inputs, ns)?;
            ns.horizontal(*op, inputs)
        }
        Expr::ConcatStr { inputs, separator } => {
            let inputs = translate_all(inputs, ns)?;
            ns.concat_str(inputs, separator)
        }
    }
}

fn translate_all<B: Backend>(
    exprs: &[Expr],
    ns: &Namespace<B>,
) -> TesseraResult<Vec<CompliantExpr<B>>> {
    exprs.iter().map(|expr| to_compliant(expr, ns)).collect()
}
