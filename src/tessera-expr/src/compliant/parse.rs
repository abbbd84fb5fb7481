//! Normalization of into-expression arguments.

use common_error::{TesseraError, TesseraResult};

use super::namespace::Namespace;
use super::node::CompliantExpr;
use super::translate::{native_series, to_compliant};
use super::traits::Backend;
use crate::into_expr::{ExprArgs, IntoExpr};

fn parse_one<B: Backend>(item: IntoExpr, ns: &Namespace<B>) -> TesseraResult<CompliantExpr<B>> {
    match item {
        IntoExpr::Expr(expr) => to_compliant(&expr, ns),
        IntoExpr::Name(name) => ns.col([name]),
        IntoExpr::Series(series) => ns.series(native_series::<B>(&series)?),
        IntoExpr::Array(array) => ns.series(B::series_from_array("", array)?),
        IntoExpr::Scalar(value) => Err(TesseraError::InvalidIntoExpr(format!(
            "expected an expression-like value (expression, column name or series), \
             got scalar {value}; wrap it in `lit` to use it as a literal"
        ))),
        IntoExpr::Many(items) => {
            let mut flat = Vec::new();
            IntoExpr::Many(items).flatten_into(&mut flat);
            match <[IntoExpr; 1]>::try_from(flat) {
                Ok([item]) => parse_one(item, ns),
                Err(flat) => Err(TesseraError::multi_output(format!(
                    "a named argument must hold a single expression, got {}",
                    flat.len()
                ))),
            }
        }
    }
}

/// Turn call arguments into backend nodes: positional arguments first, in
/// call order and flattened, then named arguments aliased to their name.
pub fn parse_into_exprs<B: Backend>(
    args: ExprArgs,
    ns: &Namespace<B>,
) -> TesseraResult<Vec<CompliantExpr<B>>> {
    let mut flat = Vec::with_capacity(args.positional.len());
    for item in args.positional {
        item.flatten_into(&mut flat);
    }
    let mut exprs = flat
        .into_iter()
        .map(|item| parse_one(item, ns))
        .collect::<TesseraResult<Vec<_>>>()?;
    for (name, item) in args.named {
        exprs.push(parse_one(item, ns)?.alias(&name)?);
    }
    Ok(exprs)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array};
    use tessera_core::Value;

    use super::*;
    use crate::compliant::mock::{frame, Mock};
    use crate::expr::{col, lit, SeriesRef};

    fn ns() -> Namespace<Mock> {
        Namespace::new()
    }

    #[test]
    fn test_positional_then_named() {
        let args = ExprArgs::from(["z", "a"])
            .arg(col("a") * 2)
            .named("extra", col("a") - 1);
        let exprs = parse_into_exprs(args, &ns()).unwrap();
        let names: Vec<_> = exprs
            .iter()
            .map(|e| e.output_names().as_known().unwrap()[0].clone())
            .collect();
        assert_eq!(names, ["z", "a", "a", "extra"]);
    }

    #[test]
    fn test_nested_inputs_flatten() {
        let args = ExprArgs::new().arg(vec![IntoExpr::from("a"), IntoExpr::from(vec!["b", "c"])]);
        assert_eq!(parse_into_exprs(args, &ns()).unwrap().len(), 3);
    }

    #[test]
    fn test_scalar_is_rejected() {
        let err = parse_into_exprs(ExprArgs::new().arg(Value::Int64(1)), &ns()).unwrap_err();
        match err {
            TesseraError::InvalidIntoExpr(msg) => {
                assert!(msg.contains("expected an expression-like value"));
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(parse_into_exprs(ExprArgs::new().arg(lit(1)), &ns()).is_ok());
    }

    #[test]
    fn test_arrays_and_series_become_literal_columns() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![7, 8, 9]));
        let exprs = parse_into_exprs(ExprArgs::new().arg(array), &ns()).unwrap();
        assert_eq!(exprs[0].function_name(), "series");
        assert_eq!(exprs[0].depth(), 0);
        let out = exprs[0].evaluate(&frame(&[("a", &[1, 2, 3])])).unwrap();
        assert_eq!(out[0].values, vec![Some(7), Some(8), Some(9)]);

        let native = crate::compliant::mock::series("s", &[1]);
        let handle = SeriesRef::new(Mock::KIND, "s", native);
        let exprs = parse_into_exprs(ExprArgs::new().arg(handle), &ns()).unwrap();
        assert_eq!(exprs[0].output_names().as_known().unwrap(), ["s"]);
    }

    #[test]
    fn test_foreign_series_is_a_type_error() {
        let handle = SeriesRef::new(common_config::BackendKind::Sql, "s", 1_i64);
        let err = parse_into_exprs(ExprArgs::new().arg(handle), &ns()).unwrap_err();
        assert!(matches!(err, TesseraError::TypeError(_)));
    }
}
