//! # litscan-exec
//!
//! Pull-based executor for literal `VALUES` lists.
//!
//! This crate implements:
//! - Runtime values, including expanded arrays with read-only coercion
//! - The scalar expression tree and a default evaluator
//! - Memory scopes with cleanup callbacks
//! - The execution context threaded through every operator call
//! - A generic scan harness (recheck, filter, projection)
//! - The VALUES scan operator
//!
//! # Execution Model
//!
//! Operators return one row per call in the context's current direction:
//!
//! ```ignore
//! let mut ctx = ExecutionContext::default();
//! let mut scan = ValuesScanExec::init(node, Arc::new(DefaultEvaluator::new()), &mut ctx)?;
//! while let Some(row) = scan.next_row(&mut ctx)? {
//!     println!("{:?}", row.to_row());
//! }
//! scan.shutdown(&mut ctx);
//! ctx.finish();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Execution context and plan state
pub mod context;

/// Expression evaluator interface and default implementation
pub mod evaluator;

/// Scalar expressions
pub mod expr;

/// Memory scopes
pub mod memory;

/// Rows and output slots
pub mod row;

/// Generic scan harness
pub mod scan;

/// Output schemas
pub mod schema;

/// Data types
pub mod types;

/// Runtime values
pub mod value;

/// VALUES list scan
pub mod values;

pub use context::{ExecutionContext, FnSubquery, PlanState, ScanDirection, SubqueryExec};
pub use evaluator::{DefaultEvaluator, ExprContext, ExprEvaluator, ExprState, InitContext};
pub use expr::{BinaryOp, ScalarExpr, SubPlanId, UnaryOp};
pub use memory::MemoryScope;
pub use row::{Row, RowSlot, SlotState};
pub use scan::{Operator, ScanAccess};
pub use schema::{Field, Schema, SchemaRef};
pub use types::DataType;
pub use value::{ArrayAccess, ExpandedArray, Value};
pub use values::{ScanMetrics, ValueRowSet, ValuesScanExec, ValuesScanNode};
