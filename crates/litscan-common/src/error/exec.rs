//! Executor error types.
//!
//! Every failure raised while scanning is terminal for the current query:
//! nothing here is retried or caught below the query boundary.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,

    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,

    // Memory errors (0x0200 - 0x02FF)
    /// A memory scope exceeded its limit.
    OutOfMemory = 0x0200,

    // Query errors (0x0600 - 0x06FF)
    /// Type mismatch.
    TypeMismatch = 0x0603,
    /// Query execution failed.
    ExecutionFailed = 0x0605,
    /// Division by zero.
    DivisionByZero = 0x0606,
    /// Sub-query evaluation failed.
    SubqueryFailed = 0x0607,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Memory",
            0x06 => "Query",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Coarse classification of executor failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A planner/compiler defect surfaced at runtime.
    Programming,
    /// A memory scope was exhausted.
    Allocation,
    /// The expression evaluator rejected an input.
    Evaluation,
    /// Configuration could not be loaded or is invalid.
    Configuration,
}

/// Errors raised by the expression evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Operand types are incompatible with the operation.
    #[error("type mismatch in {operation}: {detail}")]
    TypeMismatch {
        /// The operation being evaluated.
        operation: String,
        /// What was wrong with the operands.
        detail: String,
    },

    /// A CAST could not be performed.
    #[error("cannot cast {value} to {target}")]
    Cast {
        /// Display form of the source value.
        value: String,
        /// Target type name.
        target: String,
    },

    /// Unknown scalar function.
    #[error("function {0}() does not exist")]
    UnknownFunction(String),

    /// Reference to an outer parameter that was not supplied.
    #[error("no value found for parameter ${0}")]
    UnknownParam(usize),

    /// Column reference outside the current row.
    #[error("column index {index} out of range for row of {width} columns")]
    ColumnOutOfRange {
        /// Requested column index.
        index: usize,
        /// Width of the row being evaluated.
        width: usize,
    },

    /// A sub-query failed while producing its value.
    #[error("sub-query {subplan} failed: {message}")]
    Subquery {
        /// Sub-plan identifier.
        subplan: u32,
        /// Failure description.
        message: String,
    },
}

impl EvalError {
    /// Convenience constructor for type mismatches.
    pub fn type_mismatch(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

/// The main error type for the executor.
///
/// # Example
///
/// ```rust
/// use litscan_common::error::{ErrorKind, ExecError, ExecResult};
///
/// fn check_width(expected: usize, actual: usize) -> ExecResult<()> {
///     if expected != actual {
///         return Err(ExecError::ArityMismatch { row: 0, expected, actual });
///     }
///     Ok(())
/// }
///
/// let err = check_width(2, 3).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::Programming);
/// ```
#[derive(Debug, Error)]
pub enum ExecError {
    // ==========================================================================
    // Programming Errors
    // ==========================================================================
    /// A row's evaluation state does not match the fixed output width.
    #[error("VALUES row {row} produces {actual} columns, expected {expected}")]
    ArityMismatch {
        /// Row index within the VALUES list.
        row: usize,
        /// Width of the operator's output row.
        expected: usize,
        /// Width of the row's evaluation state.
        actual: usize,
    },

    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Allocation Errors
    // ==========================================================================
    /// A memory scope would exceed its limit.
    #[error(
        "out of memory in {scope} scope: requested {requested} bytes with {used} of {limit} in use"
    )]
    OutOfMemory {
        /// Name of the exhausted scope.
        scope: String,
        /// Bytes requested.
        requested: usize,
        /// Bytes already in use.
        used: usize,
        /// Scope limit.
        limit: usize,
    },

    // ==========================================================================
    // Evaluation Errors
    // ==========================================================================
    /// Expression evaluation failed.
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ExecError::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ExecError::Config {
            message: message.into(),
        }
    }

    /// Returns the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ExecError::ArityMismatch { .. } | ExecError::Internal { .. } => ErrorCode::Internal,
            ExecError::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            ExecError::Eval(e) => match e {
                EvalError::DivisionByZero => ErrorCode::DivisionByZero,
                EvalError::TypeMismatch { .. } | EvalError::Cast { .. } => {
                    ErrorCode::TypeMismatch
                }
                EvalError::Subquery { .. } => ErrorCode::SubqueryFailed,
                EvalError::UnknownFunction(_)
                | EvalError::UnknownParam(_)
                | EvalError::ColumnOutOfRange { .. } => ErrorCode::ExecutionFailed,
            },
            ExecError::Config { .. }
            | ExecError::ConfigParse(_)
            | ExecError::ConfigSerialize(_) => ErrorCode::InvalidArgument,
            ExecError::Io { .. } => ErrorCode::Io,
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::ArityMismatch { .. } | ExecError::Internal { .. } => {
                ErrorKind::Programming
            }
            ExecError::OutOfMemory { .. } => ErrorKind::Allocation,
            ExecError::Eval(_) => ErrorKind::Evaluation,
            ExecError::Config { .. }
            | ExecError::ConfigParse(_)
            | ExecError::ConfigSerialize(_)
            | ExecError::Io { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns true if this error signals a defect rather than bad input.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        self.kind() == ErrorKind::Programming
    }
}
