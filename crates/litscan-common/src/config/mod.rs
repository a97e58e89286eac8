//! Configuration for litscan.
//!
//! This module provides the executor configuration structures.

mod executor;

pub use executor::{ExecutorConfig, ExecutorConfigBuilder};
