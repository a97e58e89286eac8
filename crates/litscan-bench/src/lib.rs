//! # litscan-bench
//!
//! Workload generators shared by the litscan benchmarks.

#![warn(missing_docs)]

use std::sync::Arc;

use litscan_common::{ExecResult, ExecutorConfig};
use litscan_exec::{
    BinaryOp, DataType, DefaultEvaluator, ExecutionContext, FnSubquery, Operator, ScalarExpr,
    SubPlanId, Value, ValuesScanExec, ValuesScanNode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sub-plan id used by generated correlated rows.
pub const BENCH_SUBPLAN: u32 = 1;

/// Generates `n` rows of `(bigint, text, bigint + param)`.
pub fn literal_rows(n: usize, seed: u64) -> Vec<Vec<ScalarExpr>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            vec![
                ScalarExpr::lit_i64(i as i64),
                ScalarExpr::lit_str(format!("value_{}", rng.gen::<u32>())),
                ScalarExpr::binary(
                    ScalarExpr::lit_i64(rng.gen_range(0..1000)),
                    BinaryOp::Plus,
                    ScalarExpr::param(0, DataType::BigInt),
                ),
            ]
        })
        .collect()
}

/// Like [`literal_rows`], with every `every`-th row's last column replaced
/// by a sub-plan call.
pub fn correlated_rows(n: usize, every: usize, seed: u64) -> Vec<Vec<ScalarExpr>> {
    let every = every.max(1);
    let mut rows = literal_rows(n, seed);
    for row in rows.iter_mut().step_by(every) {
        if let Some(last) = row.last_mut() {
            *last = ScalarExpr::subplan(
                BENCH_SUBPLAN,
                vec![ScalarExpr::param(0, DataType::BigInt)],
                DataType::BigInt,
            );
        }
    }
    rows
}

/// Context with the bench sub-plan registered and one outer parameter.
pub fn bench_context(config: ExecutorConfig) -> ExecutionContext {
    let mut ctx = ExecutionContext::new(config).with_params(vec![Value::BigInt(7)]);
    ctx.register_subplan(
        SubPlanId(BENCH_SUBPLAN),
        Arc::new(FnSubquery::new("double", |args: &[Value]| {
            Ok(args
                .first()
                .and_then(Value::to_i64)
                .map_or(Value::Null, |v| Value::BigInt(v * 2)))
        })),
    );
    ctx
}

/// Scans `node` to the end once and returns the number of rows produced.
pub fn scan_all(node: ValuesScanNode, ctx: &mut ExecutionContext) -> ExecResult<usize> {
    let mut exec = ValuesScanExec::init(node, Arc::new(DefaultEvaluator::new()), ctx)?;
    let mut count = 0;
    while exec.next_row(ctx)?.is_some() {
        count += 1;
    }
    exec.shutdown(ctx);
    ctx.finish();
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generators() {
        let rows = correlated_rows(10, 3, 42);
        assert_eq!(rows.len(), 10);
        let correlated = rows
            .iter()
            .filter(|r| r.iter().any(ScalarExpr::contains_subplans))
            .count();
        assert_eq!(correlated, 4);
        assert_eq!(literal_rows(5, 1), literal_rows(5, 1));
    }

    #[test]
    fn test_scan_all() {
        let mut ctx = bench_context(ExecutorConfig::default());
        let n = scan_all(ValuesScanNode::new(correlated_rows(100, 10, 7)), &mut ctx).unwrap();
        assert_eq!(n, 100);
    }
}
