//! Expression evaluator interface.
//!
//! An evaluator compiles a [`ScalarExpr`] into an opaque [`ExprState`] and
//! later evaluates that state against an [`ExprContext`]. Operators decide
//! *when* state is built, reused, or dropped; the evaluator decides what the
//! state looks like.
//!
//! State is compiled under an [`InitContext`]:
//!
//! - **linked**: built on behalf of a plan node. Sub-plans may be wired in
//!   and the state's footprint is charged to the plan scope.
//! - **detached**: built inside a short-lived scope with no parent. Sub-plans
//!   cannot be wired; any resources the state acquires must be registered as
//!   cleanup callbacks on that scope.

mod default;

use std::fmt;
use std::sync::Arc;

use litscan_common::error::{ExecError, ExecResult};
use litscan_common::EvalError;

use crate::context::{PlanNodeId, PlanState, SubqueryExec};
use crate::expr::{ScalarExpr, SubPlanId};
use crate::memory::MemoryScope;
use crate::value::Value;

pub use default::DefaultEvaluator;

/// Compiles scalar expressions into evaluation state.
pub trait ExprEvaluator: fmt::Debug {
    /// Compiles `expr` under the given initialization context.
    fn compile(
        &self,
        expr: &ScalarExpr,
        init: &mut InitContext<'_>,
    ) -> ExecResult<Box<dyn ExprState>>;
}

/// Compiled, evaluator-specific state for one expression.
pub trait ExprState: fmt::Debug + Send + Sync {
    /// Evaluates the expression. NULL results are returned as `Value::Null`.
    fn evaluate(&self, ctx: &mut ExprContext<'_>) -> ExecResult<Value>;
}

/// Where compiled state is parented.
pub enum InitContext<'a> {
    /// State owned by the plan on behalf of `owner`.
    Linked {
        /// The surrounding plan.
        plan: &'a mut PlanState,
        /// Operator the state is built for.
        owner: PlanNodeId,
    },
    /// State with no parent, living in a short-lived scope.
    Detached {
        /// Scope that owns the state's resources.
        scope: &'a mut MemoryScope,
    },
}

impl<'a> InitContext<'a> {
    /// Creates a plan-linked context.
    pub fn linked(plan: &'a mut PlanState, owner: PlanNodeId) -> Self {
        InitContext::Linked { plan, owner }
    }

    /// Creates a detached context over `scope`.
    pub fn detached(scope: &'a mut MemoryScope) -> Self {
        InitContext::Detached { scope }
    }

    /// Returns true if state compiled here is parented to the plan.
    pub fn is_linked(&self) -> bool {
        matches!(self, InitContext::Linked { .. })
    }

    /// Returns the scope compiled state is charged to.
    pub fn scope(&mut self) -> &mut MemoryScope {
        match self {
            InitContext::Linked { plan, .. } => plan.memory_mut(),
            InitContext::Detached { scope } => scope,
        }
    }

    /// Wires sub-plan `id` into the state under construction.
    pub fn attach_subplan(&mut self, id: SubPlanId) -> ExecResult<Arc<dyn SubqueryExec>> {
        match self {
            InitContext::Linked { plan, owner } => plan.attach_subplan(*owner, id),
            InitContext::Detached { .. } => Err(ExecError::internal(format!(
                "{} cannot be initialized without a parent plan",
                id
            ))),
        }
    }
}

/// Per-evaluation inputs.
pub struct ExprContext<'a> {
    params: &'a [Value],
    row: &'a [Value],
    scope: &'a mut MemoryScope,
}

impl<'a> ExprContext<'a> {
    /// Creates an evaluation context.
    pub fn new(params: &'a [Value], row: &'a [Value], scope: &'a mut MemoryScope) -> Self {
        Self { params, row, scope }
    }

    /// Returns the outer parameter values.
    pub fn params(&self) -> &[Value] {
        self.params
    }

    /// Returns outer parameter `index`.
    pub fn param(&self, index: usize) -> Result<&Value, EvalError> {
        self.params
            .get(index)
            .ok_or(EvalError::UnknownParam(index))
    }

    /// Returns the input row. Empty when evaluating VALUES rows.
    pub fn row(&self) -> &[Value] {
        self.row
    }

    /// Returns column `index` of the input row.
    pub fn column(&self, index: usize) -> Result<&Value, EvalError> {
        self.row.get(index).ok_or(EvalError::ColumnOutOfRange {
            index,
            width: self.row.len(),
        })
    }

    /// Returns the scope evaluation-time resources belong to.
    pub fn scope(&mut self) -> &mut MemoryScope {
        self.scope
    }
}

/// Compiled state for one row's expression list.
#[derive(Debug)]
pub struct RowExprState {
    exprs: Vec<Box<dyn ExprState>>,
    subplans: Vec<SubPlanId>,
    linked: bool,
}

impl RowExprState {
    /// Compiles every expression of `exprs` under `init`.
    pub fn build(
        evaluator: &dyn ExprEvaluator,
        exprs: &[ScalarExpr],
        init: &mut InitContext<'_>,
    ) -> ExecResult<Self> {
        let compiled = exprs
            .iter()
            .map(|e| evaluator.compile(e, init))
            .collect::<ExecResult<Vec<_>>>()?;

        Ok(Self {
            exprs: compiled,
            subplans: exprs.iter().flat_map(ScalarExpr::subplan_ids).collect(),
            linked: init.is_linked(),
        })
    }

    /// Returns the number of output values.
    pub fn arity(&self) -> usize {
        self.exprs.len()
    }

    /// Returns true if the state is parented to the plan.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Returns the sub-plans referenced by the compiled expressions.
    pub fn subplans(&self) -> &[SubPlanId] {
        &self.subplans
    }

    /// Returns the compiled expressions in row order.
    pub fn exprs(&self) -> &[Box<dyn ExprState>] {
        &self.exprs
    }
}

/// A compiled predicate over the scan row.
#[derive(Debug)]
pub struct QualState {
    conditions: Vec<Box<dyn ExprState>>,
}

impl QualState {
    /// Compiles an implicitly AND-ed list of conditions.
    pub fn build(
        evaluator: &dyn ExprEvaluator,
        conditions: &[ScalarExpr],
        init: &mut InitContext<'_>,
    ) -> ExecResult<Self> {
        let conditions = conditions
            .iter()
            .map(|e| evaluator.compile(e, init))
            .collect::<ExecResult<Vec<_>>>()?;
        Ok(Self { conditions })
    }

    /// Returns true if every condition is true. NULL counts as false.
    pub fn check(&self, ctx: &mut ExprContext<'_>) -> ExecResult<bool> {
        for condition in &self.conditions {
            if condition.evaluate(ctx)?.to_bool() != Some(true) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
