//! Produces one output row per call from a VALUES list.

use std::sync::Arc;

use litscan_common::constants::ROW_SCOPE_NAME;
use litscan_common::error::{ExecError, ExecResult};
use tracing::trace;

use super::cursor::RowCursor;
use super::store::{EvalStateStore, StateMode};
use super::{ScanMetrics, ValueRowSet};
use crate::context::{ExecutionContext, PlanNodeId};
use crate::evaluator::{ExprContext, ExprEvaluator};
use crate::memory::MemoryScope;
use crate::row::RowSlot;
use crate::scan::ScanAccess;

/// Drives the cursor and evaluates the row it lands on.
#[derive(Debug)]
pub struct RowMaterializer {
    rows: ValueRowSet,
    cursor: RowCursor,
    store: EvalStateStore,
    /// Reset before every row.
    row_scope: MemoryScope,
    slot: RowSlot,
    evaluator: Arc<dyn ExprEvaluator>,
    metrics: ScanMetrics,
    collect_metrics: bool,
    trace_rows: bool,
}

impl RowMaterializer {
    /// Classifies `rows` and positions the cursor before the first row.
    pub fn new(
        rows: ValueRowSet,
        arity: usize,
        evaluator: Arc<dyn ExprEvaluator>,
        owner: PlanNodeId,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<Self> {
        let store = EvalStateStore::classify(&rows, evaluator.as_ref(), owner, ctx)?;
        Ok(Self {
            cursor: RowCursor::new(rows.len()),
            rows,
            store,
            row_scope: MemoryScope::new(ROW_SCOPE_NAME, ctx.config().row_memory_limit),
            slot: RowSlot::new(arity),
            evaluator,
            metrics: ScanMetrics::default(),
            collect_metrics: ctx.config().collect_metrics,
            trace_rows: ctx.config().trace_rows,
        })
    }

    /// Evaluates the next row in the context's direction.
    pub fn next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<&RowSlot>> {
        self.cursor.advance(ctx.direction());
        self.slot.clear();

        let Some(row) = self.cursor.position() else {
            return Ok(None);
        };

        // Cleanup of the previous row runs before its state is dropped.
        self.row_scope.rescan();
        self.store.discard_transient();

        let exprs = self
            .rows
            .row(row)
            .ok_or_else(|| ExecError::internal(format!("row {} missing from VALUES list", row)))?;
        let state = self
            .store
            .acquire(row, exprs, self.evaluator.as_ref(), &mut self.row_scope)?;

        if state.arity() != self.slot.arity() {
            return Err(ExecError::ArityMismatch {
                row,
                expected: self.slot.arity(),
                actual: state.arity(),
            });
        }

        for (i, expr) in state.exprs().iter().enumerate() {
            let value = {
                let mut ectx = ExprContext::new(ctx.params(), &[], &mut self.row_scope);
                expr.evaluate(&mut ectx)?
            };
            self.row_scope.reserve(value.heap_size())?;
            self.slot.set(i, value.make_read_only());
        }
        self.slot.store_virtual();

        if self.collect_metrics {
            match self.store.mode(row) {
                Some(StateMode::Persistent) => self.metrics.persistent_reuses += 1,
                _ => self.metrics.transient_builds += 1,
            }
            self.metrics.peak_row_bytes = self.row_scope.peak();
        }

        if self.trace_rows {
            trace!(
                row = row,
                direction = ?ctx.direction(),
                row_bytes = self.row_scope.used(),
                "materialized VALUES row"
            );
        }

        Ok(Some(&self.slot))
    }

    /// Rewinds to before the first row and clears the slot.
    pub fn rescan(&mut self) {
        self.cursor.reset();
        self.slot.clear();
    }

    /// Releases the per-row scope and this operator's hold on row state.
    pub fn release(&mut self) {
        self.row_scope.release();
        self.store.release();
        self.slot.clear();
        self.rows = ValueRowSet::default();
        self.cursor = RowCursor::new(0);
    }

    /// Returns the cursor.
    pub fn cursor(&self) -> &RowCursor {
        &self.cursor
    }

    /// Returns the state store.
    pub fn store(&self) -> &EvalStateStore {
        &self.store
    }

    /// Returns the per-row scope.
    pub fn row_scope(&self) -> &MemoryScope {
        &self.row_scope
    }

    /// Returns the output slot.
    pub fn slot(&self) -> &RowSlot {
        &self.slot
    }

    /// Returns the counters collected so far.
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub(super) fn metrics_mut(&mut self) -> Option<&mut ScanMetrics> {
        self.collect_metrics.then_some(&mut self.metrics)
    }
}

impl ScanAccess for RowMaterializer {
    fn fetch_next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<bool> {
        Ok(self.next(ctx)?.is_some())
    }

    fn scan_slot(&self) -> &RowSlot {
        &self.slot
    }

    fn recheck(&self, _slot: &RowSlot) -> bool {
        true
    }
}
