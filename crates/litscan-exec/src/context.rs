//! Execution context and plan-level state.
//!
//! The execution context is threaded explicitly through every operator
//! call. It carries the scan direction, the outer parameter values that
//! correlated expressions read, and the state of the surrounding plan:
//! registered sub-plans, expression state linked into the plan, and the
//! plan-lifetime memory scope.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use litscan_common::config::ExecutorConfig;
use litscan_common::constants::PLAN_SCOPE_NAME;
use litscan_common::error::{ExecError, ExecResult};
use tracing::debug;

use crate::evaluator::RowExprState;
use crate::expr::SubPlanId;
use crate::memory::MemoryScope;
use crate::value::Value;

/// Direction in which a scan advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanDirection {
    /// Towards higher row indexes.
    #[default]
    Forward,
    /// Towards lower row indexes.
    Backward,
}

impl ScanDirection {
    /// Returns true for [`ScanDirection::Forward`].
    pub fn is_forward(self) -> bool {
        self == ScanDirection::Forward
    }

    /// Returns the opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            ScanDirection::Forward => ScanDirection::Backward,
            ScanDirection::Backward => ScanDirection::Forward,
        }
    }
}

/// Identifier of an operator node within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanNodeId(pub u32);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A scalar sub-query the evaluator can invoke.
pub trait SubqueryExec: fmt::Debug + Send + Sync {
    /// Runs the sub-query for one set of correlation arguments.
    fn execute(&self, args: &[Value]) -> ExecResult<Value>;
}

type SubqueryFn = dyn Fn(&[Value]) -> ExecResult<Value> + Send + Sync;

/// A sub-query backed by a closure.
pub struct FnSubquery {
    name: String,
    func: Box<SubqueryFn>,
}

impl FnSubquery {
    /// Creates a sub-query from a closure.
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> ExecResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl SubqueryExec for FnSubquery {
    fn execute(&self, args: &[Value]) -> ExecResult<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for FnSubquery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubquery").field("name", &self.name).finish()
    }
}

/// Expression state owned by the plan on behalf of an operator.
#[derive(Debug, Clone)]
pub struct LinkedState {
    /// Operator the state was built for.
    pub owner: PlanNodeId,
    /// VALUES row the state evaluates.
    pub row: usize,
    /// Sub-plans the state invokes.
    pub subplans: Vec<SubPlanId>,
    /// The shared state.
    pub state: Arc<RowExprState>,
}

/// State of the surrounding plan.
///
/// Expression state built with this plan as parent is registered here, so
/// it is visible to introspection and released with the plan rather than
/// with the operator that built it.
#[derive(Debug)]
pub struct PlanState {
    /// Sub-queries available to expressions, by id.
    subplans: HashMap<SubPlanId, Arc<dyn SubqueryExec>>,
    /// Sub-plans wired to each operator.
    attachments: Vec<(PlanNodeId, SubPlanId)>,
    /// Expression state owned by the plan.
    linked: Vec<LinkedState>,
    /// Plan-lifetime memory scope.
    memory: MemoryScope,
    /// Next operator node id.
    next_node: u32,
}

impl PlanState {
    /// Creates an empty plan state.
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            subplans: HashMap::new(),
            attachments: Vec::new(),
            linked: Vec::new(),
            memory: MemoryScope::new(PLAN_SCOPE_NAME, config.query_memory_limit),
            next_node: 1,
        }
    }

    /// Registers a sub-query under `id`, replacing any previous one.
    pub fn register_subplan(&mut self, id: SubPlanId, exec: Arc<dyn SubqueryExec>) {
        self.subplans.insert(id, exec);
    }

    /// Returns true if any sub-query is registered.
    pub fn has_subplans(&self) -> bool {
        !self.subplans.is_empty()
    }

    /// Wires sub-plan `id` to operator `owner` and returns its executor.
    pub fn attach_subplan(
        &mut self,
        owner: PlanNodeId,
        id: SubPlanId,
    ) -> ExecResult<Arc<dyn SubqueryExec>> {
        let exec = self
            .subplans
            .get(&id)
            .cloned()
            .ok_or_else(|| ExecError::internal(format!("{} is not registered", id)))?;
        self.attachments.push((owner, id));
        Ok(exec)
    }

    /// Returns the sub-plans wired to `owner`.
    pub fn attached_subplans(&self, owner: PlanNodeId) -> Vec<SubPlanId> {
        self.attachments
            .iter()
            .filter(|(o, _)| *o == owner)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Allocates a fresh operator node id.
    pub fn allocate_node_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Takes shared ownership of expression state built for `owner`.
    pub fn link_state(&mut self, owner: PlanNodeId, row: usize, state: Arc<RowExprState>) {
        let subplans = state.subplans().to_vec();
        self.linked.push(LinkedState {
            owner,
            row,
            subplans,
            state,
        });
    }

    /// Returns the expression state owned on behalf of `owner`.
    pub fn linked_states_for(&self, owner: PlanNodeId) -> impl Iterator<Item = &LinkedState> {
        self.linked.iter().filter(move |l| l.owner == owner)
    }

    /// Returns all expression state owned by the plan.
    pub fn linked_states(&self) -> &[LinkedState] {
        &self.linked
    }

    /// Returns the plan-lifetime memory scope.
    pub fn memory(&self) -> &MemoryScope {
        &self.memory
    }

    /// Returns the plan-lifetime memory scope mutably.
    pub fn memory_mut(&mut self) -> &mut MemoryScope {
        &mut self.memory
    }

    /// Describes the linked state, one line per entry.
    pub fn explain(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for linked in &self.linked {
            lines.push(format!(
                "node {} row {}: {} expressions",
                linked.owner,
                linked.row,
                linked.state.arity()
            ));
            for id in &linked.subplans {
                lines.push(format!("  {}", id));
            }
        }
        lines
    }

    /// Releases everything the plan owns.
    pub fn shutdown(&mut self) {
        debug!(
            linked_states = self.linked.len(),
            subplans = self.subplans.len(),
            plan_bytes = self.memory.used(),
            "shutting down plan state"
        );
        self.memory.release();
        self.linked.clear();
        self.attachments.clear();
        self.subplans.clear();
    }
}

/// Execution context for query processing.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Executor configuration.
    config: ExecutorConfig,
    /// Current scan direction.
    direction: ScanDirection,
    /// Outer parameter values.
    params: Vec<Value>,
    /// Whether scans must recheck rows before returning them.
    recheck: bool,
    /// Surrounding plan state.
    plan: PlanState,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl ExecutionContext {
    /// Creates a new execution context with the given config.
    pub fn new(config: ExecutorConfig) -> Self {
        let plan = PlanState::new(&config);
        Self {
            config,
            direction: ScanDirection::Forward,
            params: Vec::new(),
            recheck: false,
            plan,
        }
    }

    /// Sets the outer parameter values.
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns the current scan direction.
    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    /// Changes the scan direction for subsequent calls.
    pub fn set_direction(&mut self, direction: ScanDirection) {
        self.direction = direction;
    }

    /// Returns the outer parameter values.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Replaces the outer parameter values.
    pub fn set_params(&mut self, params: Vec<Value>) {
        self.params = params;
    }

    /// Returns true if scans must recheck rows.
    pub fn recheck_enabled(&self) -> bool {
        self.recheck
    }

    /// Enables or disables row rechecks.
    pub fn set_recheck(&mut self, enabled: bool) {
        self.recheck = enabled;
    }

    /// Returns the plan state.
    pub fn plan(&self) -> &PlanState {
        &self.plan
    }

    /// Returns the plan state mutably.
    pub fn plan_mut(&mut self) -> &mut PlanState {
        &mut self.plan
    }

    /// Registers a sub-query with the plan.
    pub fn register_subplan(&mut self, id: SubPlanId, exec: Arc<dyn SubqueryExec>) {
        self.plan.register_subplan(id, exec);
    }

    /// Ends the query, releasing plan-owned state.
    pub fn finish(&mut self) {
        self.plan.shutdown();
    }
}
