//! VALUES list scan.
//!
//! Materializes the rows of a literal `VALUES (...), (...)` list one at a
//! time, in either direction. Each row's expressions are evaluated against
//! the outer parameters only; there is no input tuple.
//!
//! # Evaluation state
//!
//! Rows differ in how long their compiled expression state lives:
//!
//! - Rows without sub-plans get fresh, detached state on every visit. It is
//!   built inside the per-row scope and dropped before the next row is
//!   evaluated, so memory stays flat however long the list is.
//! - Rows with sub-plans (when the plan supports them) get state built once
//!   at initialization and linked into the plan. The plan owns it; rescans
//!   and operator shutdown leave it alone.
//!
//! Every produced value is forced read-only before it lands in the output
//! slot, since downstream consumers may read the same buffer several times.

mod cursor;
mod materializer;
mod store;

use std::sync::Arc;

use litscan_common::constants::{VALUES_COLUMN_PREFIX, VALUES_RELATION_NAME};
use litscan_common::error::ExecResult;
use tracing::debug;

use crate::context::{ExecutionContext, PlanNodeId};
use crate::evaluator::ExprEvaluator;
use crate::expr::ScalarExpr;
use crate::row::RowSlot;
use crate::scan::{exec_scan, Operator, ScanAccess, ScanState};
use crate::schema::{Field, Schema, SchemaRef};

pub use cursor::RowCursor;
pub use materializer::RowMaterializer;
pub use store::{EvalStateStore, StateMode};

/// The rows of a VALUES list, one expression list per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRowSet {
    rows: Vec<Vec<ScalarExpr>>,
}

impl ValueRowSet {
    /// Creates a row set. Rows are expected to share one arity.
    pub fn new(rows: Vec<Vec<ScalarExpr>>) -> Self {
        Self { rows }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the expressions of row `index`.
    pub fn row(&self, index: usize) -> Option<&[ScalarExpr]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Iterates over the rows in order.
    pub fn iter(&self) -> impl Iterator<Item = &[ScalarExpr]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Returns the arity of the first row, or 0 for an empty list.
    pub fn arity(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Derives the output schema from the first row.
    pub fn schema(&self) -> Schema {
        let empty = Schema::empty();
        let fields = self
            .rows
            .first()
            .map(|first| {
                first
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        Field::nullable(
                            format!("{}{}", VALUES_COLUMN_PREFIX, i + 1),
                            e.data_type(&empty),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Schema::new(fields)
    }
}

impl From<Vec<Vec<ScalarExpr>>> for ValueRowSet {
    fn from(rows: Vec<Vec<ScalarExpr>>) -> Self {
        Self::new(rows)
    }
}

/// Planner output for a VALUES scan.
#[derive(Debug, Clone, Default)]
pub struct ValuesScanNode {
    /// The literal rows.
    pub values_lists: ValueRowSet,
    /// Conditions every returned row must satisfy.
    pub qual: Vec<ScalarExpr>,
    /// Output expressions over `column1..columnK`, if any.
    pub projection: Option<Vec<ScalarExpr>>,
}

impl ValuesScanNode {
    /// Creates a node scanning `rows`.
    pub fn new(rows: Vec<Vec<ScalarExpr>>) -> Self {
        Self {
            values_lists: ValueRowSet::new(rows),
            qual: Vec::new(),
            projection: None,
        }
    }

    /// Adds a filter condition.
    pub fn with_qual(mut self, condition: ScalarExpr) -> Self {
        self.qual.push(condition);
        self
    }

    /// Sets the output projection.
    pub fn with_projection(mut self, exprs: Vec<ScalarExpr>) -> Self {
        self.projection = Some(exprs);
        self
    }
}

/// Counters collected by a VALUES scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanMetrics {
    /// Rows returned to the caller.
    pub rows_emitted: u64,
    /// Row visits that built transient state.
    pub transient_builds: u64,
    /// Row visits that reused persistent state.
    pub persistent_reuses: u64,
    /// Rescans performed.
    pub rescans: u64,
    /// Highest per-row scope charge observed.
    pub peak_row_bytes: usize,
}

/// Executes a VALUES scan.
#[derive(Debug)]
pub struct ValuesScanExec {
    id: PlanNodeId,
    materializer: RowMaterializer,
    scan: ScanState,
    rows: usize,
}

impl ValuesScanExec {
    /// Builds the operator for `node`.
    ///
    /// Rows with sub-plans get their state built and linked into the plan
    /// here. The output shape comes from the first row.
    pub fn init(
        node: ValuesScanNode,
        evaluator: Arc<dyn ExprEvaluator>,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<Self> {
        let id = ctx.plan_mut().allocate_node_id();
        let ValuesScanNode {
            values_lists,
            qual,
            projection,
        } = node;

        let schema: SchemaRef = Arc::new(values_lists.schema());
        let rows = values_lists.len();
        let arity = schema.len();

        let materializer =
            RowMaterializer::new(values_lists, arity, Arc::clone(&evaluator), id, ctx)?;
        let scan = ScanState::new(
            evaluator.as_ref(),
            schema,
            &qual,
            projection.as_deref(),
            id,
            ctx,
        )?;

        debug!(
            node = %id,
            rows,
            arity,
            persistent_rows = materializer.store().persistent_rows(),
            "initialized VALUES scan"
        );

        Ok(Self {
            id,
            materializer,
            scan,
            rows,
        })
    }

    /// Returns the plan node id of this operator.
    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    /// Rows produced here never need re-validation. This is the same hook
    /// the scan loop calls.
    pub fn recheck(&self, slot: &RowSlot) -> bool {
        ScanAccess::recheck(&self.materializer, slot)
    }

    /// Returns the cursor.
    pub fn cursor(&self) -> &RowCursor {
        self.materializer.cursor()
    }

    /// Returns the materializer.
    pub fn materializer(&self) -> &RowMaterializer {
        &self.materializer
    }

    /// Returns the counters collected so far.
    pub fn metrics(&self) -> ScanMetrics {
        *self.materializer.metrics()
    }

    /// Describes the operator on one line.
    pub fn explain(&self) -> String {
        let mut out = format!(
            "Values Scan on \"{}\" (rows={} columns={} persistent={})",
            VALUES_RELATION_NAME,
            self.rows,
            self.materializer.slot().arity(),
            self.materializer.store().persistent_rows()
        );
        if self.scan.has_qual() {
            out.push_str(" filtered");
        }
        if self.scan.has_projection() {
            out.push_str(" projected");
        }
        out
    }
}

impl Operator for ValuesScanExec {
    fn name(&self) -> &'static str {
        "ValuesScan"
    }

    fn schema(&self) -> &SchemaRef {
        self.scan.schema()
    }

    fn next_row(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<&RowSlot>> {
        if exec_scan(&mut self.materializer, &mut self.scan, ctx)?.is_none() {
            return Ok(None);
        }

        if let Some(metrics) = self.materializer.metrics_mut() {
            metrics.rows_emitted += 1;
        }

        if self.scan.has_projection() {
            Ok(Some(self.scan.result()))
        } else {
            Ok(Some(self.materializer.slot()))
        }
    }

    fn rescan(&mut self, _ctx: &mut ExecutionContext) -> ExecResult<()> {
        self.materializer.rescan();
        self.scan.clear_result();
        if let Some(metrics) = self.materializer.metrics_mut() {
            metrics.rescans += 1;
        }
        debug!(node = %self.id, "rescanning VALUES scan");
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ExecutionContext) {
        debug!(
            node = %self.id,
            row_scope_peak = self.materializer.row_scope().peak(),
            scan_scope_peak = self.scan.scope().peak(),
            "shutting down VALUES scan"
        );
        self.materializer.release();
        self.scan.release();
    }
}
