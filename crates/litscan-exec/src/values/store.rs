//! Per-row evaluation state with transient and persistent lifetimes.

use std::sync::Arc;

use litscan_common::error::{ExecError, ExecResult};

use super::ValueRowSet;
use crate::context::{ExecutionContext, PlanNodeId};
use crate::evaluator::{ExprEvaluator, InitContext, RowExprState};
use crate::expr::ScalarExpr;
use crate::memory::MemoryScope;

/// Lifetime of a row's evaluation state, fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// Rebuilt on every visit inside the per-row scope.
    Transient,
    /// Built once, linked into the plan, reused on every visit.
    Persistent,
}

/// Evaluation state for every row of a VALUES list.
#[derive(Debug)]
pub struct EvalStateStore {
    modes: Vec<StateMode>,
    persistent: Vec<Option<Arc<RowExprState>>>,
    /// State of the row most recently visited, if it was transient.
    transient: Option<RowExprState>,
}

impl EvalStateStore {
    /// Classifies every row and builds persistent state.
    ///
    /// A row is persistent only if one of its expressions contains a
    /// sub-plan and the plan has sub-query support at all; otherwise no
    /// row is even inspected.
    pub fn classify(
        rows: &ValueRowSet,
        evaluator: &dyn ExprEvaluator,
        owner: PlanNodeId,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<Self> {
        let mut modes = vec![StateMode::Transient; rows.len()];
        let mut persistent = vec![None; rows.len()];

        if ctx.plan().has_subplans() {
            for (i, exprs) in rows.iter().enumerate() {
                if !exprs.iter().any(ScalarExpr::contains_subplans) {
                    continue;
                }

                let state = {
                    let mut init = InitContext::linked(ctx.plan_mut(), owner);
                    Arc::new(RowExprState::build(evaluator, exprs, &mut init)?)
                };
                ctx.plan_mut().link_state(owner, i, Arc::clone(&state));
                modes[i] = StateMode::Persistent;
                persistent[i] = Some(state);
            }
        }

        Ok(Self {
            modes,
            persistent,
            transient: None,
        })
    }

    /// Returns the mode of `row`.
    pub fn mode(&self, row: usize) -> Option<StateMode> {
        self.modes.get(row).copied()
    }

    /// Returns the number of persistent rows.
    pub fn persistent_rows(&self) -> usize {
        self.modes
            .iter()
            .filter(|m| **m == StateMode::Persistent)
            .count()
    }

    /// Returns the persistent state of `row`, if any.
    pub fn persistent(&self, row: usize) -> Option<&Arc<RowExprState>> {
        self.persistent.get(row).and_then(Option::as_ref)
    }

    /// Returns true while transient state from the last visit is held.
    pub fn has_transient(&self) -> bool {
        self.transient.is_some()
    }

    /// Drops the transient state of the previous visit.
    pub fn discard_transient(&mut self) {
        self.transient = None;
    }

    /// Returns the state to evaluate `row` with.
    ///
    /// Persistent state is returned as is. Transient state is built fresh,
    /// detached, inside `scope`.
    pub fn acquire(
        &mut self,
        row: usize,
        exprs: &[ScalarExpr],
        evaluator: &dyn ExprEvaluator,
        scope: &mut MemoryScope,
    ) -> ExecResult<&RowExprState> {
        match self.mode(row) {
            Some(StateMode::Persistent) => self
                .persistent
                .get(row)
                .and_then(Option::as_deref)
                .ok_or_else(|| ExecError::internal(format!("missing persistent state for row {}", row))),
            Some(StateMode::Transient) => {
                let mut init = InitContext::detached(scope);
                let state = RowExprState::build(evaluator, exprs, &mut init)?;
                Ok(self.transient.insert(state))
            }
            None => Err(ExecError::internal(format!(
                "row {} outside VALUES list of {} rows",
                row,
                self.modes.len()
            ))),
        }
    }

    /// Drops this operator's references to all state.
    ///
    /// Persistent state stays alive through the plan's references.
    pub fn release(&mut self) {
        self.transient = None;
        self.persistent.clear();
        self.modes.clear();
    }
}
