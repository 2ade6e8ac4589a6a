//! Stable exit codes for `cmdgate` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Planning, execution, recovery, config or I/O failure.
pub const ERROR: i32 = 1;
/// The command envelope was rejected before execution.
pub const REJECTED: i32 = 2;
/// A segregation rule was broken.
pub const VIOLATION: i32 = 3;

/// Exit code for a terminal pipeline error.
pub fn for_error(err: &crate::error::PipelineError) -> i32 {
    use crate::error::PipelineError;
    match err {
        PipelineError::Command(_) => REJECTED,
        PipelineError::Segregation(_) => VIOLATION,
        PipelineError::Planning(_) | PipelineError::Execution(_) | PipelineError::Recovery(_) => {
            ERROR
        }
    }
}
