//! Group-by aggregation: classify, reject, build, execute.
//!
//! Each aggregation node is classified before anything runs:
//!
//! - depth 0 with an aggregation name (`len()`): anchored on the first key
//! - `col(..).<reduction>()`: one native aggregation per (root, output) pair
//! - anything else is *complex*, and handled according to the backend's
//!   [`AggregationStrategy`]
//!
//! Anonymous nodes are rejected up front: without output names there is
//! nothing to name the result columns after.

use common_error::{TesseraError, TesseraResult};
use log::debug;
use tessera_core::{Names, Value};

use super::node::CompliantExpr;
use super::traits::{AggregationStrategy, Backend, CompliantFrame, CompliantSeries};
use crate::expr::{AggFunc, Probability, QuantileMethod};

const ANONYMOUS_IN_GROUP_BY: &str = "Anonymous expressions are not supported in group_by.agg. \
     Instead of `all()`, try using a named expression, such as `col('a', 'b')`";

/// A group-by request: keys plus aggregation nodes, consumed by [`agg`].
pub struct AggregationRequest<B: Backend> {
    pub keys: Vec<String>,
    pub exprs: Vec<CompliantExpr<B>>,
    pub drop_null_keys: bool,
}

/// How one aggregation node will be executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Native aggregations, as (function, input column, output column).
    Simple(Vec<(AggFunc, String, String)>),
    /// Needs more than a single native reduction.
    Complex,
}

fn ddof_of<B: Backend>(expr: &CompliantExpr<B>) -> u8 {
    expr.kwargs()
        .get("ddof")
        .and_then(Value::as_int64)
        .and_then(|ddof| u8::try_from(ddof).ok())
        .unwrap_or(1)
}

/// The aggregate `name` stands for, parameterized from the node's kwargs.
fn aggregate_of<B: Backend>(expr: &CompliantExpr<B>, name: &str) -> Option<AggFunc> {
    B::native_aggregation(name)?;
    match AggFunc::from_name(name, ddof_of(expr))? {
        AggFunc::Quantile { .. } => {
            let kwargs = expr.kwargs();
            let quantile = kwargs.get("quantile").and_then(Value::as_float64)?;
            let method = kwargs
                .get("interpolation")
                .and_then(Value::as_str)
                .and_then(QuantileMethod::from_name)?;
            Some(AggFunc::Quantile {
                quantile: Probability::new(quantile),
                method,
            })
        }
        other => Some(other),
    }
}

/// Classify one node against the grouping keys.
pub fn classify<B: Backend>(expr: &CompliantExpr<B>, keys: &[String]) -> Classified {
    let lookup = |name: &str| aggregate_of(expr, name);
    let (Names::Known(roots), Names::Known(outputs)) = (expr.root_names(), expr.output_names())
    else {
        return Classified::Complex;
    };

    if expr.depth() == 0 {
        return match (lookup(expr.function_name()), keys.first(), outputs.as_slice()) {
            (Some(func), Some(anchor), [output]) if expr.returns_scalar() => {
                Classified::Simple(vec![(func, anchor.clone(), output.clone())])
            }
            _ => Classified::Complex,
        };
    }

    let Some(step) = expr.function_name().strip_prefix("col->") else {
        return Classified::Complex;
    };
    match lookup(step) {
        Some(func) if !step.contains("->") && roots.len() == outputs.len() => Classified::Simple(
            roots
                .iter()
                .zip(outputs)
                .map(|(root, output)| (func, root.clone(), output.clone()))
                .collect(),
        ),
        _ => Classified::Complex,
    }
}

fn complex_message<B: Backend>(expr: &CompliantExpr<B>) -> &'static str {
    if expr.returns_scalar() {
        "Non-trivial complex aggregation found."
    } else {
        "Failed to aggregate - does your aggregation function return a scalar?"
    }
}

fn reraise(err: TesseraError) -> TesseraError {
    match err {
        TesseraError::InvalidAggregation(msg) => TesseraError::complex_aggregation(msg),
        other => other,
    }
}

/// Run a group-by aggregation on `frame`.
pub fn agg<B: Backend>(frame: &B::Frame, request: AggregationRequest<B>) -> TesseraResult<B::Frame> {
    let AggregationRequest {
        keys,
        exprs,
        drop_null_keys,
    } = request;

    let columns = frame.columns();
    if let Some(missing) = keys.iter().find(|key| !columns.contains(key)) {
        return Err(TesseraError::column_not_found(missing.clone()));
    }
    if exprs.iter().any(|expr| expr.output_names().is_unknown()) {
        return Err(TesseraError::anonymous(ANONYMOUS_IN_GROUP_BY));
    }

    let classified: Vec<Classified> = exprs.iter().map(|expr| classify(expr, &keys)).collect();
    for (expr, class) in exprs.iter().zip(&classified) {
        debug!(
            "group_by on {}: `{}` is {:?}",
            B::KIND,
            expr.function_name(),
            class
        );
    }
    let has_complex = classified.contains(&Classified::Complex);

    if has_complex && B::AGGREGATION_STRATEGY == AggregationStrategy::PerGroupEvaluation {
        return frame
            .group_and_evaluate(&keys, &exprs, drop_null_keys)
            .map_err(reraise);
    }

    let mut aggs = Vec::new();
    for (expr, class) in exprs.iter().zip(classified) {
        match class {
            Classified::Simple(pairs) => {
                for (func, input, output) in pairs {
                    aggs.push(B::aggregation(func, &input, &output)?);
                }
            }
            Classified::Complex => match B::AGGREGATION_STRATEGY {
                AggregationStrategy::NativeExpressions => {
                    for series in expr.evaluate(frame)? {
                        let output = series.name().to_string();
                        aggs.push(B::aggregation_from_series(series, &output).map_err(reraise)?);
                    }
                }
                _ => {
                    return Err(TesseraError::complex_aggregation(complex_message(expr)));
                }
            },
        }
    }
    frame
        .group_and_aggregate(&keys, &aggs, drop_null_keys)
        .map_err(reraise)
}
