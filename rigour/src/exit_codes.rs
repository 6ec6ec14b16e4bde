//! Stable exit codes for rigour CLI commands.

/// Every gate passed, or a governance command succeeded.
pub const PASS: i32 = 0;
/// The report failed, the file guard tripped, or the iteration budget ran out.
pub const FAIL: i32 = 1;
/// `rigour.toml` is missing, unparsable, or invalid.
pub const CONFIG_ERROR: i32 = 2;
/// Anything else: I/O, spawn failures, corrupt state.
pub const INTERNAL_ERROR: i32 = 3;
