//! Executor configuration.
//!
//! These settings bound the memory the VALUES scan may hold and control
//! how much it reports while running.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_QUERY_MEMORY_LIMIT, DEFAULT_ROW_MEMORY_LIMIT, UNLIMITED};
use crate::error::{ExecError, ExecResult};

/// Executor configuration.
///
/// # Example
///
/// ```rust
/// use litscan_common::config::ExecutorConfig;
///
/// let config = ExecutorConfig::builder()
///     .row_memory_limit(64 * 1024)
///     .trace_rows(true)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum bytes a single per-row scope may hold. 0 means unlimited.
    #[serde(default = "default_row_memory_limit")]
    pub row_memory_limit: usize,

    /// Maximum bytes of plan-lifetime state (persistent evaluation state,
    /// quals, projections). 0 means unlimited.
    #[serde(default = "default_query_memory_limit")]
    pub query_memory_limit: usize,

    /// Emit a trace event for every materialized row.
    #[serde(default)]
    pub trace_rows: bool,

    /// Collect per-operator scan metrics.
    #[serde(default = "default_collect_metrics")]
    pub collect_metrics: bool,
}

fn default_row_memory_limit() -> usize {
    DEFAULT_ROW_MEMORY_LIMIT
}

fn default_query_memory_limit() -> usize {
    DEFAULT_QUERY_MEMORY_LIMIT
}

fn default_collect_metrics() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            row_memory_limit: default_row_memory_limit(),
            query_memory_limit: default_query_memory_limit(),
            trace_rows: false,
            collect_metrics: default_collect_metrics(),
        }
    }
}

impl ExecutorConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for tests: small limits, tracing on.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            row_memory_limit: 1024 * 1024,
            query_memory_limit: 16 * 1024 * 1024,
            trace_rows: true,
            collect_metrics: true,
        }
    }

    /// Creates a configuration with no memory limits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            row_memory_limit: UNLIMITED,
            query_memory_limit: UNLIMITED,
            ..Self::default()
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> ExecResult<()> {
        if self.row_memory_limit != UNLIMITED
            && self.query_memory_limit != UNLIMITED
            && self.row_memory_limit > self.query_memory_limit
        {
            return Err(ExecError::config(
                "row_memory_limit must not exceed query_memory_limit",
            ));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> ExecResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string and validates it.
    pub fn from_toml_str(content: &str) -> ExecResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> ExecResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> ExecResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::new()
    }
}

/// Builder for executor configuration.
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-row scope limit in bytes.
    #[must_use]
    pub fn row_memory_limit(mut self, bytes: usize) -> Self {
        self.config.row_memory_limit = bytes;
        self
    }

    /// Sets the plan-level scope limit in bytes.
    #[must_use]
    pub fn query_memory_limit(mut self, bytes: usize) -> Self {
        self.config.query_memory_limit = bytes;
        self
    }

    /// Enables per-row trace events.
    #[must_use]
    pub fn trace_rows(mut self, enabled: bool) -> Self {
        self.config.trace_rows = enabled;
        self
    }

    /// Enables metrics collection.
    #[must_use]
    pub fn collect_metrics(mut self, enabled: bool) -> Self {
        self.config.collect_metrics = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ExecutorConfig {
        self.config
    }
}
