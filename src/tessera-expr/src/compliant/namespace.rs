//! Per-backend factory of primitive expression nodes.

use std::fmt;
use std::marker::PhantomData;

use common_error::{TesseraError, TesseraResult};
use log::debug;
use tessera_core::{DType, Names, Value};

use super::comparand::{Comparand, Reconciled};
use super::node::{CompliantExpr, ExprMeta};
use super::traits::{Backend, CompliantFrame, CompliantSeries};
use crate::expr::{AggFunc, BinaryOp, Elementwise, HorizontalOp, Selector};

/// Builds leaf and combinator nodes for backend `B`. Stateless.
pub struct Namespace<B: Backend> {
    _backend: PhantomData<B>,
}

impl<B: Backend> Default for Namespace<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Clone for Namespace<B> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for Namespace<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", B::KIND)
    }
}

impl<B: Backend> Namespace<B> {
    pub const fn new() -> Self {
        Self {
            _backend: PhantomData,
        }
    }

    /// Reference columns by name, in the order given.
    pub fn col<I, S>(&self, names: I) -> TesseraResult<CompliantExpr<B>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let meta = ExprMeta::leaf("col", Names::Known(names.clone()), Names::Known(names.clone()));
        CompliantExpr::new(meta, move |frame: &B::Frame| {
            names.iter().map(|name| frame.column(name)).collect()
        })
    }

    /// Every column of the frame.
    pub fn all(&self) -> TesseraResult<CompliantExpr<B>> {
        let meta = ExprMeta::leaf("all", Names::Unknown, Names::Unknown);
        CompliantExpr::new(meta, |frame: &B::Frame| {
            frame
                .columns()
                .iter()
                .map(|name| frame.column(name))
                .collect()
        })
    }

    /// A literal, output `literal`.
    pub fn lit(&self, value: Value, dtype: Option<DType>) -> TesseraResult<CompliantExpr<B>> {
        let meta = ExprMeta::leaf("lit", Names::empty(), Names::known(["literal"])).scalar();
        CompliantExpr::new(meta, move |frame: &B::Frame| {
            Ok(vec![frame.literal(&value, dtype.as_ref())?])
        })
    }

    /// Number of rows, output `len`.
    pub fn len(&self) -> TesseraResult<CompliantExpr<B>> {
        let meta = ExprMeta::leaf("len", Names::empty(), Names::known(["len"])).scalar();
        CompliantExpr::new(meta, |frame: &B::Frame| Ok(vec![frame.len_series()?]))
    }

    /// A native series used as a literal column.
    pub fn series(&self, series: B::Series) -> TesseraResult<CompliantExpr<B>> {
        let meta = ExprMeta::leaf("series", Names::empty(), Names::known([series.name()]));
        CompliantExpr::new(meta, move |_: &B::Frame| Ok(vec![series.clone()]))
    }

    fn reduction<I, S>(&self, names: I, func: AggFunc) -> TesseraResult<CompliantExpr<B>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.col(names)?.reduce(func)
    }

    pub fn sum<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        names: I,
    ) -> TesseraResult<CompliantExpr<B>> {
        self.reduction(names, AggFunc::Sum)
    }

    pub fn mean<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        names: I,
    ) -> TesseraResult<CompliantExpr<B>> {
        self.reduction(names, AggFunc::Mean)
    }

    pub fn min<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        names: I,
    ) -> TesseraResult<CompliantExpr<B>> {
        self.reduction(names, AggFunc::Min)
    }

    pub fn max<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        names: I,
    ) -> TesseraResult<CompliantExpr<B>> {
        self.reduction(names, AggFunc::Max)
    }

    /// Columns whose logical dtype the selector matches.
    pub fn selector(&self, selector: Selector) -> TesseraResult<CompliantExpr<B>> {
        let meta = ExprMeta::leaf("selector", Names::Unknown, Names::Unknown);
        CompliantExpr::new(meta, move |frame: &B::Frame| {
            let mut selected = Vec::new();
            for name in frame.columns() {
                let dtype = B::to_logical(&frame.dtype_of(&name)?);
                if selector.matches(&dtype) {
                    selected.push(frame.column(&name)?);
                }
            }
            Ok(selected)
        })
    }

    /// Metadata shared by the horizontal combinators.
    fn horizontal_meta(label: &str, exprs: &[CompliantExpr<B>]) -> TesseraResult<ExprMeta> {
        let Some(first) = exprs.first() else {
            return Err(TesseraError::value_error(format!(
                "At least one expression must be passed to `{label}`"
            )));
        };
        let root_names = Names::union_all(exprs.iter().map(CompliantExpr::root_names));
        let output_names = if root_names.is_unknown() {
            Names::Unknown
        } else {
            first.output_names().first()
        };
        Ok(ExprMeta {
            depth: exprs.iter().map(CompliantExpr::depth).max().unwrap_or(0) + 1,
            function_name: label.to_string(),
            root_names,
            output_names,
            returns_scalar: exprs.iter().all(CompliantExpr::returns_scalar),
            kwargs: Default::default(),
        })
    }

    /// Evaluate every input and flatten the outputs in order.
    fn evaluate_all(exprs: &[CompliantExpr<B>], frame: &B::Frame) -> TesseraResult<Vec<B::Series>> {
        let mut out = Vec::new();
        for expr in exprs {
            out.extend(expr.evaluate(frame)?);
        }
        Ok(out)
    }

    /// Row-wise reduction across the outputs of `exprs`, named after the
    /// first output.
    pub fn horizontal(
        &self,
        op: HorizontalOp,
        exprs: Vec<CompliantExpr<B>>,
    ) -> TesseraResult<CompliantExpr<B>> {
        let meta = Self::horizontal_meta(op.label(), &exprs)?;
        debug!(
            "{} over {} inputs on {}",
            op.label(),
            exprs.len(),
            B::KIND
        );
        CompliantExpr::new(meta, move |frame: &B::Frame| {
            let series = Self::evaluate_all(&exprs, frame)?;
            let Some((first, rest)) = series.split_first() else {
                return Err(TesseraError::value_error(format!(
                    "`{}` found no columns to combine",
                    op.label()
                )));
            };
            let result = match op {
                HorizontalOp::All => fold_binary::<B>(first, rest, BinaryOp::And)?,
                HorizontalOp::Any => fold_binary::<B>(first, rest, BinaryOp::Or)?,
                HorizontalOp::Sum => sum_filled::<B>(first, rest)?,
                HorizontalOp::Mean => {
                    let total = sum_filled::<B>(first, rest)?;
                    let count = count_valid::<B>(first, rest)?;
                    total.binary(BinaryOp::TrueDiv, &total.reconcile_series(&count)?, false)?
                }
            };
            Ok(vec![result.rename(first.name())])
        })
    }

    /// Row-wise string concatenation; a null in any input gives null.
    pub fn concat_str(
        &self,
        exprs: Vec<CompliantExpr<B>>,
        separator: &str,
    ) -> TesseraResult<CompliantExpr<B>> {
        let meta = Self::horizontal_meta("concat_str", &exprs)?;
        let separator = separator.to_string();
        CompliantExpr::new(meta, move |frame: &B::Frame| {
            let series = Self::evaluate_all(&exprs, frame)?;
            let Some((first, rest)) = series.split_first() else {
                return Err(TesseraError::value_error("`concat_str` found no columns"));
            };
            let mut acc = first.clone();
            for next in rest {
                acc = acc.str_concat(next, &separator)?;
            }
            Ok(vec![acc.rename(first.name())])
        })
    }
}

fn fold_binary<B: Backend>(
    first: &B::Series,
    rest: &[B::Series],
    op: BinaryOp,
) -> TesseraResult<B::Series> {
    let mut acc = first.clone();
    for next in rest {
        let rhs = acc.reconcile(&Comparand::Series(next.clone()))?;
        acc = acc.binary(op, &rhs, false)?;
    }
    Ok(acc)
}

fn zero_filled<B: Backend>(series: &B::Series) -> TesseraResult<B::Series> {
    series.fill_null(&Reconciled::Scalar(Value::Int64(0)))
}

fn sum_filled<B: Backend>(first: &B::Series, rest: &[B::Series]) -> TesseraResult<B::Series> {
    let mut acc = zero_filled::<B>(first)?;
    for next in rest {
        let rhs = acc.reconcile_series(&zero_filled::<B>(next)?)?;
        acc = acc.binary(BinaryOp::Add, &rhs, false)?;
    }
    Ok(acc)
}

fn count_valid<B: Backend>(first: &B::Series, rest: &[B::Series]) -> TesseraResult<B::Series> {
    let as_count = |series: &B::Series| {
        series
            .elementwise(&Elementwise::IsNotNull)?
            .elementwise(&Elementwise::Cast(DType::Int64))
    };
    let mut acc = as_count(first)?;
    for next in rest {
        let rhs = acc.reconcile_series(&as_count(next)?)?;
        acc = acc.binary(BinaryOp::Add, &rhs, false)?;
    }
    Ok(acc)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliant::mock::{frame, Mock, MockFrame, MockSeries};

    fn ns() -> Namespace<Mock> {
        Namespace::new()
    }

    fn sample() -> MockFrame {
        let mut f = frame(&[("a", &[1, 2, 3]), ("b", &[10, 20, 30])]);
        f.columns.push(MockSeries {
            name: "c".into(),
            values: vec![Some(1), None, Some(5)],
        });
        f
    }

    #[test]
    fn test_leaves() {
        let col = ns().col(["b", "a", "b"]).unwrap();
        assert_eq!(col.depth(), 0);
        assert_eq!(col.output_names(), &Names::Known(vec!["b".into(), "a".into(), "b".into()]));
        assert_eq!(col.evaluate(&sample()).unwrap().len(), 3);

        let lit = ns().lit(Value::Int64(3), None).unwrap();
        assert_eq!(lit.output_names(), &Names::known(["literal"]));
        assert_eq!(lit.root_names(), &Names::empty());
        assert!(lit.returns_scalar());

        let len = ns().len().unwrap();
        assert_eq!(len.function_name(), "len");
        assert_eq!(len.evaluate(&sample()).unwrap()[0].values, vec![Some(3)]);

        let all = ns().all().unwrap();
        assert!(all.output_names().is_unknown());
        assert_eq!(all.evaluate(&sample()).unwrap().len(), 3);
    }

    #[test]
    fn test_sum_horizontal_treats_null_as_zero() {
        let expr = ns()
            .horizontal(HorizontalOp::Sum, vec![ns().col(["a"]).unwrap(), ns().col(["c"]).unwrap()])
            .unwrap();
        assert_eq!(expr.depth(), 1);
        assert_eq!(expr.root_names(), &Names::known(["a", "c"]));
        assert_eq!(expr.output_names(), &Names::known(["a"]));
        let out = expr.evaluate(&sample()).unwrap();
        assert_eq!(out[0].values, vec![Some(2), Some(2), Some(8)]);
    }

    #[test]
    fn test_mean_horizontal_averages_valid_values() {
        let expr = ns()
            .horizontal(HorizontalOp::Mean, vec![ns().col(["b", "c"]).unwrap()])
            .unwrap();
        let out = expr.evaluate(&sample()).unwrap();
        assert_eq!(out[0].name, "b");
        assert_eq!(out[0].values, vec![Some(5), Some(20), Some(17)]);
    }

    #[test]
    fn test_horizontal_depth_and_unknown_names() {
        let deep = ns().col(["a"]).unwrap().elementwise(Elementwise::Abs).unwrap();
        let expr = ns()
            .horizontal(HorizontalOp::Any, vec![deep, ns().all().unwrap()])
            .unwrap();
        assert_eq!(expr.depth(), 2);
        assert!(expr.root_names().is_unknown());
        assert!(expr.output_names().is_unknown());

        let err = ns().horizontal(HorizontalOp::All, Vec::new()).unwrap_err();
        assert!(matches!(err, TesseraError::ValueError(_)));
    }

    #[test]
    fn test_selector_uses_logical_dtypes() {
        let numeric = ns().selector(Selector::Numeric).unwrap();
        assert_eq!(numeric.evaluate(&sample()).unwrap().len(), 3);
        let strings = ns().selector(Selector::String).unwrap();
        assert!(strings.evaluate(&sample()).unwrap().is_empty());
    }
}
