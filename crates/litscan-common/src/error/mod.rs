//! Error handling for litscan.
//!
//! This module provides the unified error type and result alias used
//! across the executor.

mod exec;

pub use exec::{ErrorCode, ErrorKind, EvalError, ExecError};

/// Result type alias for executor operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;
