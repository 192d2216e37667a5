//! Stable exit codes for ledger CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config, unreadable storage or other errors.
pub const INVALID: i32 = 1;
/// `ledger show` found no run with the requested id.
pub const NOT_FOUND: i32 = 2;
