//! Backend expression nodes.
//!
//! A [`CompliantExpr`] is a deferred computation from a native frame to one
//! or more native columns, together with the metadata the rest of the layer
//! needs without evaluating anything:
//!
//! - `depth`: 0 for leaves, +1 per chained operation (aliases excluded)
//! - `function_name`: the chain of operation labels, e.g. `col->filter->mean`
//! - `root_names` / `output_names`: the columns read and produced
//! - `returns_scalar`: whether each output collapses to a single value
//! - `kwargs`: the keyword arguments of the last operation
//!
//! Root names are unknown exactly when output names are; every constructor
//! checks this. Nodes are immutable and cheap to clone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use common_error::{TesseraError, TesseraResult};
use tessera_core::{Names, Value};

use super::comparand::{Comparand, NativeOutput};
use super::traits::{Backend, CompliantSeries};
use crate::expr::{AggFunc, BinaryOp, ClosedInterval, Elementwise, NameOp, Reshape};

/// Evaluation function of a node.
pub type EvalFn<B> = Arc<
    dyn Fn(&<B as Backend>::Frame) -> TesseraResult<Vec<<B as Backend>::Series>> + Send + Sync,
>;

/// Metadata of an expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprMeta {
    pub depth: usize,
    pub function_name: String,
    pub root_names: Names,
    pub output_names: Names,
    pub returns_scalar: bool,
    pub kwargs: BTreeMap<String, Value>,
}

impl ExprMeta {
    /// Metadata of a leaf node.
    pub fn leaf(function_name: &str, root_names: Names, output_names: Names) -> Self {
        Self {
            depth: 0,
            function_name: function_name.to_string(),
            root_names,
            output_names,
            returns_scalar: false,
            kwargs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn scalar(mut self) -> Self {
        self.returns_scalar = true;
        self
    }
}

/// A deferred native computation plus its metadata.
pub struct CompliantExpr<B: Backend> {
    call: EvalFn<B>,
    meta: ExprMeta,
}

/// An operand of a derived node.
pub enum ExprOperand<B: Backend> {
    /// Evaluated against the same frame as the parent.
    Expr(CompliantExpr<B>),
    /// A native series, passed through.
    Series(B::Series),
    Scalar(Value),
}

impl<B: Backend> Clone for ExprOperand<B> {
    fn clone(&self) -> Self {
        match self {
            Self::Expr(expr) => Self::Expr(expr.clone()),
            Self::Series(series) => Self::Series(series.clone()),
            Self::Scalar(value) => Self::Scalar(value.clone()),
        }
    }
}

impl<B: Backend> fmt::Debug for ExprOperand<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            Self::Series(series) => f.debug_tuple("Series").field(series).finish(),
            Self::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
        }
    }
}

impl<B: Backend> ExprOperand<B> {
    fn returns_scalar(&self) -> bool {
        match self {
            Self::Expr(expr) => expr.returns_scalar(),
            Self::Series(_) => false,
            Self::Scalar(_) => true,
        }
    }

    fn resolve(&self, frame: &B::Frame) -> TesseraResult<Comparand<B>> {
        Ok(match self {
            Self::Expr(expr) => Comparand::Exprs(expr.evaluate(frame)?),
            Self::Series(series) => Comparand::Series(series.clone()),
            Self::Scalar(value) => Comparand::Scalar(value.clone()),
        })
    }
}

impl<B: Backend> Clone for CompliantExpr<B> {
    fn clone(&self) -> Self {
        Self {
            call: Arc::clone(&self.call),
            meta: self.meta.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for CompliantExpr<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompliantExpr")
            .field("backend", &B::KIND)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

fn check_names(meta: &ExprMeta) -> TesseraResult<()> {
    if meta.root_names.is_unknown() != meta.output_names.is_unknown() {
        return Err(TesseraError::consistency(format!(
            "expression `{}` has root names {:?} but output names {:?}; \
             both must be known or both unknown",
            meta.function_name, meta.root_names, meta.output_names
        )));
    }
    Ok(())
}

impl<B: Backend> CompliantExpr<B> {
    /// Build a node, checking the name invariant.
    pub fn new<F>(meta: ExprMeta, call: F) -> TesseraResult<Self>
    where
        F: Fn(&B::Frame) -> TesseraResult<Vec<B::Series>> + Send + Sync + 'static,
    {
        check_names(&meta)?;
        Ok(Self {
            call: Arc::new(call),
            meta,
        })
    }

    pub fn meta(&self) -> &ExprMeta {
        &self.meta
    }

    pub fn depth(&self) -> usize {
        self.meta.depth
    }

    pub fn function_name(&self) -> &str {
        &self.meta.function_name
    }

    pub fn root_names(&self) -> &Names {
        &self.meta.root_names
    }

    pub fn output_names(&self) -> &Names {
        &self.meta.output_names
    }

    pub fn returns_scalar(&self) -> bool {
        self.meta.returns_scalar
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.meta.kwargs
    }

    /// Evaluate against a native frame.
    ///
    /// Fails with `InternalConsistency` when the produced column names do
    /// not match known output names.
    pub fn evaluate(&self, frame: &B::Frame) -> TesseraResult<Vec<B::Series>> {
        let outputs = (self.call)(frame)?;
        if let Names::Known(expected) = &self.meta.output_names {
            let produced = outputs.iter().map(|series| series.name());
            if !produced.eq(expected.iter().map(String::as_str)) {
                return Err(TesseraError::consistency(format!(
                    "expression `{}` was expected to produce {:?} but produced {:?}",
                    self.meta.function_name,
                    expected,
                    outputs.iter().map(|series| series.name()).collect::<Vec<_>>()
                )));
            }
        }
        Ok(outputs)
    }

    /// A copy with extra keyword arguments recorded.
    pub fn with_kwargs(mut self, kwargs: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.meta.kwargs.extend(kwargs);
        self
    }

    /// Chain one operation onto this node.
    ///
    /// `native` runs once per output column of `self`, with every operand
    /// resolved against the same frame; a scalar result is wrapped back
    /// into a one-value series. `step_scalar` marks reductions.
    pub fn derive<F>(
        &self,
        label: &str,
        step_scalar: bool,
        operands: Vec<(String, ExprOperand<B>)>,
        native: F,
    ) -> TesseraResult<Self>
    where
        F: Fn(&B::Series, &[Comparand<B>]) -> TesseraResult<NativeOutput<B::Series>>
            + Send
            + Sync
            + 'static,
    {
        let mut root_names = self.meta.root_names.clone();
        for (_, operand) in &operands {
            if root_names.is_unknown() {
                break;
            }
            if let ExprOperand::Expr(expr) = operand {
                root_names = root_names.union(expr.root_names());
            }
        }
        let output_names = if root_names.is_unknown() {
            Names::Unknown
        } else {
            self.meta.output_names.clone()
        };
        let returns_scalar = step_scalar
            || (self.meta.returns_scalar && operands.iter().all(|(_, op)| op.returns_scalar()));
        let kwargs = operands
            .iter()
            .filter_map(|(name, op)| match op {
                ExprOperand::Scalar(value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect();
        let meta = ExprMeta {
            depth: self.meta.depth + 1,
            function_name: format!("{}->{label}", self.meta.function_name),
            root_names,
            output_names,
            returns_scalar,
            kwargs,
        };

        let parent = self.clone();
        Self::new(meta, move |frame| {
            let resolved = operands
                .iter()
                .map(|(_, op)| op.resolve(frame))
                .collect::<TesseraResult<Vec<_>>>()?;
            parent
                .evaluate(frame)?
                .iter()
                .map(|series| match native(series, &resolved)? {
                    NativeOutput::Series(out) => Ok(out),
                    NativeOutput::Scalar(value) => {
                        <B::Series as CompliantSeries<B>>::from_scalar(value, series)
                    }
                })
                .collect()
        })
    }

    /// Rename the single output. Anonymous nodes stay anonymous.
    pub fn alias(&self, name: &str) -> TesseraResult<Self> {
        let mut meta = self.meta.clone();
        if !meta.output_names.is_unknown() {
            meta.output_names = Names::Known(vec![name.to_string()]);
        }
        let parent = self.clone();
        let name = name.to_string();
        Self::new(meta, move |frame| {
            let outputs = parent.evaluate(frame)?;
            match outputs.as_slice() {
                [series] => Ok(vec![series.rename(&name)]),
                _ => Err(TesseraError::multi_output(format!(
                    "Cannot alias an expression producing {} columns to `{name}`; \
                     use `name.suffix` or `name.prefix` instead",
                    outputs.len()
                ))),
            }
        })
    }

    /// Rename every output with `op`.
    pub fn map_names(&self, op: &NameOp) -> TesseraResult<Self> {
        let Names::Known(outputs) = &self.meta.output_names else {
            return Err(TesseraError::anonymous(format!(
                "`{}` cannot be applied to an anonymous expression such as `all()` \
                 or a selector",
                op.label()
            )));
        };
        let renamed: Vec<String> = match (op, &self.meta.root_names) {
            (NameOp::Keep, Names::Known(roots)) if roots.len() == outputs.len() => roots.clone(),
            (NameOp::Keep, Names::Known(roots)) if !roots.is_empty() && outputs.len() == 1 => {
                vec![roots[0].clone()]
            }
            _ => outputs.iter().map(|name| op.apply(name)).collect(),
        };
        let mut meta = self.meta.clone();
        meta.output_names = Names::Known(renamed.clone());
        let parent = self.clone();
        Self::new(meta, move |frame| {
            let outputs = parent.evaluate(frame)?;
            if outputs.len() != renamed.len() {
                return Err(TesseraError::consistency(format!(
                    "renaming expected {} columns, got {}",
                    renamed.len(),
                    outputs.len()
                )));
            }
            Ok(outputs
                .iter()
                .zip(&renamed)
                .map(|(series, name)| series.rename(name))
                .collect())
        })
    }

    /// Apply a binary operator against `other`.
    pub fn binary(&self, op: BinaryOp, other: ExprOperand<B>) -> TesseraResult<Self> {
        self.derive(op.label(), false, vec![("other".into(), other)], move |series, ops| {
            let rhs = series.reconcile(&ops[0])?;
            series.binary(op, &rhs, false).map(NativeOutput::Series)
        })
    }

    /// Reduce each output to one value.
    pub fn reduce(&self, func: AggFunc) -> TesseraResult<Self> {
        let expr = self.derive(func.name(), true, Vec::new(), move |series, _| {
            series.reduce(func).map(NativeOutput::Scalar)
        })?;
        Ok(expr.with_kwargs(func.kwargs()))
    }

    pub fn elementwise(&self, op: Elementwise) -> TesseraResult<Self> {
        let label = op.label();
        self.derive(label, false, Vec::new(), move |series, _| {
            series.elementwise(&op).map(NativeOutput::Series)
        })
    }

    pub fn reshape(&self, op: Reshape) -> TesseraResult<Self> {
        self.derive(op.label(), false, Vec::new(), move |series, _| {
            series.reshape(op).map(NativeOutput::Series)
        })
    }

    pub fn fill_null(&self, value: ExprOperand<B>) -> TesseraResult<Self> {
        self.derive("fill_null", false, vec![("value".into(), value)], |series, ops| {
            let value = series.reconcile(&ops[0])?;
            series.fill_null(&value).map(NativeOutput::Series)
        })
    }

    /// Keep the values where `predicate` holds.
    pub fn filter(&self, predicate: ExprOperand<B>) -> TesseraResult<Self> {
        self.derive("filter", false, vec![("predicate".into(), predicate)], |series, ops| {
            let mask = ops[0].single_output()?;
            series.filter(mask).map(NativeOutput::Series)
        })
    }

    /// This node's values where `predicate` holds, `otherwise` elsewhere.
    pub fn when_then(
        &self,
        predicate: ExprOperand<B>,
        otherwise: ExprOperand<B>,
    ) -> TesseraResult<Self> {
        self.derive(
            "when",
            false,
            vec![("predicate".into(), predicate), ("otherwise".into(), otherwise)],
            |series, ops| {
                let mask = ops[0].single_output()?;
                let otherwise = series.reconcile(&ops[1])?;
                series.zip_with(mask, &otherwise).map(NativeOutput::Series)
            },
        )
    }

    pub fn is_between(
        &self,
        lower: ExprOperand<B>,
        upper: ExprOperand<B>,
        closed: ClosedInterval,
    ) -> TesseraResult<Self> {
        let (lower_op, upper_op) = closed.operators();
        self.derive(
            "is_between",
            false,
            vec![("lower_bound".into(), lower), ("upper_bound".into(), upper)],
            move |series, ops| {
                let lower = series.reconcile(&ops[0])?;
                let upper = series.reconcile(&ops[1])?;
                let above = series.binary(lower_op, &lower, false)?;
                let below = series.binary(upper_op, &upper, false)?;
                above
                    .binary(BinaryOp::And, &above.reconcile_series(&below)?, false)
                    .map(NativeOutput::Series)
            },
        )
    }
}
