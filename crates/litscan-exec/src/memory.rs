//! Memory scopes for expression evaluation.
//!
//! A scope accounts the bytes held by evaluation state and values built
//! inside it, and carries the cleanup callbacks registered by that state.
//! Everything charged to a scope is released together: callbacks run
//! (most recent first) and the accounting drops back to zero.
//!
//! # Scopes used by a scan
//!
//! - **row**: reset before every row of a VALUES list is materialized.
//! - **scan**: reset before every qual/projection pass of the scan harness.
//! - **plan**: lives as long as the plan; holds persistent state.

use std::fmt;

use litscan_common::constants::UNLIMITED;
use litscan_common::error::{ExecError, ExecResult};
use tracing::warn;

/// Callback run when a scope is reset or released.
pub type CleanupFn = Box<dyn FnOnce()>;

/// A resettable accounting region with cleanup callbacks.
///
/// Not thread-safe; each operator owns its scopes exclusively.
pub struct MemoryScope {
    /// Scope name, used in errors and logs.
    name: &'static str,
    /// Byte limit (0 = unlimited).
    limit: usize,
    /// Bytes currently charged.
    used: usize,
    /// Highest `used` ever observed.
    peak: usize,
    /// Number of completed resets.
    resets: u64,
    /// Pending callbacks, in registration order.
    callbacks: Vec<CleanupFn>,
}

impl MemoryScope {
    /// Creates a scope with the given byte limit.
    pub fn new(name: &'static str, limit: usize) -> Self {
        Self {
            name,
            limit,
            used: 0,
            peak: 0,
            resets: 0,
            callbacks: Vec::new(),
        }
    }

    /// Creates a scope without a limit.
    pub fn unlimited(name: &'static str) -> Self {
        Self::new(name, UNLIMITED)
    }

    /// Returns the scope name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Charges `bytes` to the scope.
    ///
    /// Fails without charging anything if the limit would be exceeded.
    pub fn reserve(&mut self, bytes: usize) -> ExecResult<()> {
        if bytes == 0 {
            return Ok(());
        }

        let new_used = self.used.saturating_add(bytes);
        if self.limit != UNLIMITED && new_used > self.limit {
            warn!(
                scope = self.name,
                requested = bytes,
                used = self.used,
                limit = self.limit,
                "memory scope limit exceeded"
            );
            return Err(ExecError::OutOfMemory {
                scope: self.name.to_string(),
                requested: bytes,
                used: self.used,
                limit: self.limit,
            });
        }

        self.used = new_used;
        self.peak = self.peak.max(new_used);
        Ok(())
    }

    /// Registers a callback to run at the next reset or release.
    pub fn register_cleanup(&mut self, callback: impl FnOnce() + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Runs pending callbacks and forgets everything charged so far.
    ///
    /// Callbacks run in reverse registration order, before the accounting
    /// is cleared.
    pub fn rescan(&mut self) {
        self.run_callbacks();
        self.used = 0;
        self.resets += 1;
    }

    /// Releases the scope at teardown. The scope stays usable.
    pub fn release(&mut self) {
        self.run_callbacks();
        self.used = 0;
    }

    fn run_callbacks(&mut self) {
        while let Some(callback) = self.callbacks.pop() {
            callback();
        }
    }

    /// Returns the bytes currently charged.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Returns the highest charge ever observed.
    #[inline]
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Returns the byte limit (0 = unlimited).
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of resets performed.
    #[inline]
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Returns the number of callbacks waiting to run.
    #[inline]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        self.run_callbacks();
    }
}

impl fmt::Debug for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScope")
            .field("name", &self.name)
            .field("limit", &self.limit)
            .field("used", &self.used)
            .field("peak", &self.peak)
            .field("resets", &self.resets)
            .field("pending_callbacks", &self.callbacks.len())
            .finish()
    }
}
