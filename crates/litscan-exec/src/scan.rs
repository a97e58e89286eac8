//! Generic scan harness.
//!
//! Scan operators produce candidate rows through [`ScanAccess`]; the harness
//! applies the optional recheck hook, filter and projection around them.

use std::sync::Arc;

use litscan_common::constants::SCAN_SCOPE_NAME;
use litscan_common::error::ExecResult;

use crate::context::{ExecutionContext, PlanNodeId};
use crate::evaluator::{ExprContext, ExprEvaluator, InitContext, QualState, RowExprState};
use crate::expr::ScalarExpr;
use crate::memory::MemoryScope;
use crate::row::RowSlot;
use crate::schema::{Field, Schema, SchemaRef};

/// A pull-based physical operator.
pub trait Operator {
    /// Returns the operator name.
    fn name(&self) -> &'static str;

    /// Returns the output schema.
    fn schema(&self) -> &SchemaRef;

    /// Returns the next row in the context's direction, or `None` at the end.
    fn next_row(&mut self, ctx: &mut ExecutionContext) -> ExecResult<Option<&RowSlot>>;

    /// Rewinds the operator to its initial position.
    fn rescan(&mut self, ctx: &mut ExecutionContext) -> ExecResult<()>;

    /// Releases operator resources.
    fn shutdown(&mut self, ctx: &mut ExecutionContext);
}

/// Row source driven by [`exec_scan`].
pub trait ScanAccess {
    /// Produces the next row into the scan slot. Returns false at the end.
    fn fetch_next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<bool>;

    /// Returns the slot `fetch_next` fills.
    fn scan_slot(&self) -> &RowSlot;

    /// Re-validates a fetched row.
    fn recheck(&self, slot: &RowSlot) -> bool;
}

/// Operator-level qual/projection state.
#[derive(Debug)]
pub struct ScanState {
    qual: Option<QualState>,
    projection: Option<RowExprState>,
    /// Reset before every harness iteration.
    scope: MemoryScope,
    result: RowSlot,
    schema: SchemaRef,
}

impl ScanState {
    /// Compiles `qual` and `projection` over rows of `input`.
    ///
    /// Without a projection the output schema is `input` itself.
    pub fn new(
        evaluator: &dyn ExprEvaluator,
        input: SchemaRef,
        qual: &[ScalarExpr],
        projection: Option<&[ScalarExpr]>,
        owner: PlanNodeId,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<Self> {
        let mut init = InitContext::linked(ctx.plan_mut(), owner);

        let qual = if qual.is_empty() {
            None
        } else {
            Some(QualState::build(evaluator, qual, &mut init)?)
        };

        let (projection, schema) = match projection {
            Some(exprs) => {
                let fields = exprs
                    .iter()
                    .map(|e| {
                        let name = match e {
                            ScalarExpr::Column { name, .. } => name.clone(),
                            other => other.to_string(),
                        };
                        Field::nullable(name, e.data_type(&input))
                    })
                    .collect();
                let state = RowExprState::build(evaluator, exprs, &mut init)?;
                (Some(state), Arc::new(Schema::new(fields)))
            }
            None => (None, input),
        };

        Ok(Self {
            qual,
            projection,
            scope: MemoryScope::new(SCAN_SCOPE_NAME, ctx.config().row_memory_limit),
            result: RowSlot::new(schema.len()),
            schema,
        })
    }

    /// Returns the output schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Returns true if rows are filtered.
    pub fn has_qual(&self) -> bool {
        self.qual.is_some()
    }

    /// Returns true if rows are projected into a separate result slot.
    pub fn has_projection(&self) -> bool {
        self.projection.is_some()
    }

    /// Returns the operator-level scope.
    pub fn scope(&self) -> &MemoryScope {
        &self.scope
    }

    /// Returns the projection result slot.
    pub fn result(&self) -> &RowSlot {
        &self.result
    }

    /// Clears the result slot.
    pub fn clear_result(&mut self) {
        self.result.clear();
    }

    /// Releases the operator-level scope and clears the result slot.
    pub fn release(&mut self) {
        self.scope.release();
        self.result.clear();
    }
}

/// Pulls rows from `access` until one passes the recheck hook and qual.
///
/// Returns the projected row, or the scan slot itself when there is no
/// projection.
pub fn exec_scan<'a, A: ScanAccess>(
    access: &'a mut A,
    scan: &'a mut ScanState,
    ctx: &mut ExecutionContext,
) -> ExecResult<Option<&'a RowSlot>> {
    loop {
        scan.scope.rescan();

        if !access.fetch_next(ctx)? {
            scan.result.clear();
            return Ok(None);
        }

        let slot = access.scan_slot();
        if ctx.recheck_enabled() && !access.recheck(slot) {
            continue;
        }

        if let Some(qual) = &scan.qual {
            let mut ectx = ExprContext::new(ctx.params(), slot.values(), &mut scan.scope);
            if !qual.check(&mut ectx)? {
                continue;
            }
        }

        if let Some(projection) = &scan.projection {
            scan.result.clear();
            for (i, expr) in projection.exprs().iter().enumerate() {
                let mut ectx = ExprContext::new(ctx.params(), slot.values(), &mut scan.scope);
                let value = expr.evaluate(&mut ectx)?;
                scan.result.set(i, value);
            }
            scan.result.store_virtual();
        }
        break;
    }

    if scan.projection.is_some() {
        Ok(Some(&scan.result))
    } else {
        Ok(Some(access.scan_slot()))
    }
}
