//! System-wide constants for litscan.

/// Prefix used to name the output columns of a VALUES list
/// (`column1`, `column2`, ...).
pub const VALUES_COLUMN_PREFIX: &str = "column";

/// Relation name shown for a VALUES list in plan output.
pub const VALUES_RELATION_NAME: &str = "*VALUES*";

/// Name of the per-row memory scope.
pub const ROW_SCOPE_NAME: &str = "row";

/// Name of the operator-level (qual/projection) memory scope.
pub const SCAN_SCOPE_NAME: &str = "scan";

/// Name of the plan-level memory scope.
pub const PLAN_SCOPE_NAME: &str = "plan";

/// Default byte limit of a single per-row scope (8 MB).
pub const DEFAULT_ROW_MEMORY_LIMIT: usize = 8 * 1024 * 1024;

/// Default byte limit of the plan-level scope (256 MB).
pub const DEFAULT_QUERY_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Sentinel meaning "no limit" for memory scope limits.
pub const UNLIMITED: usize = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_ordered() {
        assert!(DEFAULT_ROW_MEMORY_LIMIT < DEFAULT_QUERY_MEMORY_LIMIT);
        assert_eq!(UNLIMITED, 0);
    }
}
