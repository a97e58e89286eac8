//! # litscan-common
//!
//! Common types, errors, and configuration for litscan.
//!
//! This crate provides the foundational pieces shared by the executor and
//! its benchmarks:
//!
//! - **Errors**: Unified error handling with `ExecError` and `EvalError`
//! - **Config**: Executor configuration (`ExecutorConfig`)
//! - **Constants**: System-wide constants and limits
//!
//! ## Example
//!
//! ```rust
//! use litscan_common::config::ExecutorConfig;
//! use litscan_common::error::{ExecError, ExecResult};
//!
//! fn check(config: &ExecutorConfig) -> ExecResult<()> {
//!     config.validate()
//! }
//!
//! assert!(check(&ExecutorConfig::default()).is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;

// Re-export commonly used items at the crate root
pub use config::ExecutorConfig;
pub use error::{ErrorCode, ErrorKind, EvalError, ExecError, ExecResult};
