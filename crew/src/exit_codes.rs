//! Stable exit codes for crew CLI commands.

/// Command succeeded or the run reached `Done`.
pub const OK: i32 = 0;
/// Invalid config or arguments, or any other error.
pub const INVALID: i32 = 1;
/// `crew run` ended in `Failed`.
pub const RUN_FAILED: i32 = 2;
/// `crew exec` produced a non-success result.
pub const COMMAND_FAILED: i32 = 3;
