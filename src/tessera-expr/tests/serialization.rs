//! Expression trees survive a trip through JSON.

use proptest::prelude::*;
use tessera_core::testing::{arb_flat_dtype, arb_value};
use tessera_core::DType;
use tessera_expr::expr::{
    concat_str, len, lit_typed, sum_horizontal, when, BinaryOp, QuantileMethod,
};
use tessera_expr::{col, lit, selectors, Expr};

#[derive(Debug, Clone)]
enum Step {
    Binary(BinaryOp, i64),
    Round(u32),
    Cast(DType),
    FillNull(i64),
    Shift(i64),
    Between(i64, i64),
    Upper,
    Year,
    Mean,
    Std(u8),
    Quantile(f64, QuantileMethod),
    IsUnique,
    TotalMinutes,
    WhenPositive(i64),
    Alias(String),
    Suffix(String),
}

fn arb_step() -> impl Strategy<Value = Step> {
    let ops = prop::sample::select(vec![
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::TrueDiv,
        BinaryOp::Mod,
        BinaryOp::Gt,
        BinaryOp::Eq,
    ]);
    prop_oneof![
        (ops, any::<i64>()).prop_map(|(op, v)| Step::Binary(op, v)),
        (0u32..6).prop_map(Step::Round),
        arb_flat_dtype().prop_map(Step::Cast),
        any::<i64>().prop_map(Step::FillNull),
        (-3i64..3).prop_map(Step::Shift),
        (any::<i64>(), any::<i64>()).prop_map(|(lo, hi)| Step::Between(lo, hi)),
        Just(Step::Upper),
        Just(Step::Year),
        Just(Step::Mean),
        (0u8..2).prop_map(Step::Std),
        (0.0f64..=1.0, prop::sample::select(QuantileMethod::ALL.to_vec()))
            .prop_map(|(q, method)| Step::Quantile(q, method)),
        Just(Step::IsUnique),
        Just(Step::TotalMinutes),
        any::<i64>().prop_map(Step::WhenPositive),
        "[a-z]{1,6}".prop_map(Step::Alias),
        "_[a-z]{1,3}".prop_map(Step::Suffix),
    ]
}

fn apply(expr: Expr, step: Step) -> Expr {
    match step {
        Step::Binary(op, v) => match op {
            BinaryOp::Add => expr + v,
            BinaryOp::Sub => expr - v,
            BinaryOp::Mul => expr * v,
            BinaryOp::TrueDiv => expr / v,
            BinaryOp::Mod => expr % v,
            BinaryOp::Gt => expr.gt(v),
            _ => expr.eq(v),
        },
        Step::Round(decimals) => expr.round(decimals),
        Step::Cast(dtype) => expr.cast(dtype),
        Step::FillNull(v) => expr.fill_null(v),
        Step::Shift(n) => expr.shift(n),
        Step::Between(lo, hi) => expr.is_between(lo, hi, Default::default()),
        Step::Upper => expr.str().to_uppercase(),
        Step::Year => expr.dt().year(),
        Step::Mean => expr.mean(),
        Step::Std(ddof) => expr.std(ddof),
        Step::Quantile(q, method) => expr.quantile(q, method),
        Step::IsUnique => expr.is_unique(),
        Step::TotalMinutes => expr.dt().total_minutes(),
        Step::WhenPositive(v) => when(col("a").gt(0)).then(expr).otherwise(v),
        Step::Alias(name) => expr.alias(name),
        Step::Suffix(suffix) => expr.name().suffix(suffix),
    }
}

fn roundtrip(expr: &Expr) -> Expr {
    let json = serde_json::to_string(expr).unwrap();
    serde_json::from_str(&json).unwrap()
}

proptest! {
    #[test]
    fn prop_chains_roundtrip(steps in prop::collection::vec(arb_step(), 0..10)) {
        let expr = steps.into_iter().fold(col("a"), apply);
        prop_assert_eq!(roundtrip(&expr), expr);
    }

    #[test]
    fn prop_literals_roundtrip(value in arb_value()) {
        let expr = lit(value);
        prop_assert_eq!(roundtrip(&expr), expr);
    }
}

#[test]
fn test_leaf_and_horizontal_roundtrip() {
    let exprs = [
        len(),
        selectors::numeric().sum(),
        lit_typed(1_i64, DType::Int32),
        sum_horizontal([col("a"), col("b") * 2]),
        concat_str([col("z"), col("a").cast(DType::String)], "-"),
        col("a").is_in([1_i64, 2, 3]),
    ];
    for expr in exprs {
        assert_eq!(roundtrip(&expr), expr);
    }
}
