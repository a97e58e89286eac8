//! Shared helpers for VALUES scan integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use litscan_common::{ExecResult, ExecutorConfig};
use litscan_exec::{
    DefaultEvaluator, ExecutionContext, ExprContext, ExprEvaluator, ExprState, FnSubquery,
    InitContext, Operator, Row, ScalarExpr, SubPlanId, Value, ValuesScanExec, ValuesScanNode,
};
use parking_lot::Mutex;

/// Something observable the tracking evaluator did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// State number `n` was compiled.
    Build(usize),
    /// State number `n` was evaluated.
    Eval(usize),
    /// The cleanup callback of state `n` ran.
    Cleanup(usize),
    /// State `n` was dropped.
    Drop(usize),
}

/// Shared event log.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    events: Arc<Mutex<Vec<Event>>>,
    next_id: Arc<AtomicUsize>,
}

impl Tracker {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn builds(&self) -> usize {
        self.count(|e| matches!(e, Event::Build(_)))
    }

    pub fn cleanups(&self) -> usize {
        self.count(|e| matches!(e, Event::Cleanup(_)))
    }

    pub fn drops(&self) -> usize {
        self.count(|e| matches!(e, Event::Drop(_)))
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Wraps [`DefaultEvaluator`] and logs every build, evaluation, cleanup and
/// drop. Each compiled state registers one cleanup callback on the scope it
/// is built in.
#[derive(Debug, Clone, Default)]
pub struct TrackingEvaluator {
    pub tracker: Tracker,
}

impl ExprEvaluator for TrackingEvaluator {
    fn compile(
        &self,
        expr: &ScalarExpr,
        init: &mut InitContext<'_>,
    ) -> ExecResult<Box<dyn ExprState>> {
        let inner = DefaultEvaluator::new().compile(expr, init)?;
        let id = self.tracker.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.tracker.push(Event::Build(id));
        let tracker = self.tracker.clone();
        init.scope()
            .register_cleanup(move || tracker.push(Event::Cleanup(id)));

        Ok(Box::new(TrackedState {
            id,
            inner,
            tracker: self.tracker.clone(),
        }))
    }
}

#[derive(Debug)]
struct TrackedState {
    id: usize,
    inner: Box<dyn ExprState>,
    tracker: Tracker,
}

impl ExprState for TrackedState {
    fn evaluate(&self, ctx: &mut ExprContext<'_>) -> ExecResult<Value> {
        self.tracker.push(Event::Eval(self.id));
        self.inner.evaluate(ctx)
    }
}

impl Drop for TrackedState {
    fn drop(&mut self) {
        self.tracker.push(Event::Drop(self.id));
    }
}

/// Installs a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Context with test limits.
pub fn test_context() -> ExecutionContext {
    init_tracing();
    ExecutionContext::new(ExecutorConfig::for_testing())
}

/// Registers sub-plan `id` returning `param0 * 100` (or NULL without it).
pub fn register_times_hundred(ctx: &mut ExecutionContext, id: u32) {
    ctx.register_subplan(
        SubPlanId(id),
        Arc::new(FnSubquery::new("times_hundred", |args: &[Value]| {
            Ok(match args.first().and_then(Value::to_i64) {
                Some(v) => Value::BigInt(v * 100),
                None => Value::Null,
            })
        })),
    );
}

/// Literal rows from values.
pub fn literal_rows(rows: Vec<Vec<Value>>) -> Vec<Vec<ScalarExpr>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(ScalarExpr::lit).collect())
        .collect()
}

/// Single-column rows `0..n`.
pub fn int_rows(n: usize) -> Vec<Vec<ScalarExpr>> {
    (0..n).map(|i| vec![ScalarExpr::lit_i64(i as i64)]).collect()
}

/// Initializes a scan over `node` with the default evaluator.
pub fn default_scan(node: ValuesScanNode, ctx: &mut ExecutionContext) -> ValuesScanExec {
    ValuesScanExec::init(node, Arc::new(DefaultEvaluator::new()), ctx).unwrap()
}

/// Pulls rows until the end, in the context's current direction.
pub fn drain(exec: &mut ValuesScanExec, ctx: &mut ExecutionContext) -> Vec<Row> {
    let mut out = Vec::new();
    while let Some(slot) = exec.next_row(ctx).unwrap() {
        out.push(slot.to_row().unwrap());
    }
    out
}

/// First column of each row as i64.
pub fn first_column(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.get(0).and_then(Value::to_i64).unwrap())
        .collect()
}
