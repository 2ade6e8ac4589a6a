//! Error kinds surfaced by the pipeline.
//!
//! Each layer raises its own leaf error; [`PipelineError`] is the closed set a
//! caller of the control plane can observe. Per layer:
//!
//! - [`CommandError`]: raised by the control plane before any backend or tool
//!   call. Never retried.
//! - [`PlanningError`] and [`ExecutionError`]: raised inside one
//!   plan-then-execute attempt. The orchestrator retries the whole attempt.
//! - [`RecoveryError`]: all attempts exhausted. Terminal.
//! - [`SegregationViolation`]: raised by the segregation enforcer at call sites
//!   outside the plan/execute path. Never retried.

use std::time::Duration;

use thiserror::Error;

/// A step action that is not present or not enabled in the capability table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("capability not available: {0}")]
pub struct CapabilityError(pub String);

/// Tool lookup miss; lists what is registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tool: {name}. available: {available}")]
pub struct ToolNotFound {
    pub name: String,
    pub available: String,
}

/// Failure reported by a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("no backends configured")]
    NoBackends,
    #[error("backend {0} is not connected")]
    NotConnected(String),
    #[error("backend timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(String),
}

/// Malformed command envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CommandError(pub String);

/// No backend output validated as a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlanningError(pub String);

/// A step failed; nothing after `index` ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExecutionError {
    /// Zero-based index of the failing step.
    pub index: usize,
    pub action: String,
    /// Steps that completed before the failure.
    pub steps_executed: usize,
    pub message: String,
}

/// A segregation boundary rule was broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SegregationViolation(pub String);

/// Bounded retry gave up. `log` holds one line per failed attempt.
#[derive(Debug, Error)]
#[error("failed {description} after {attempts} attempts:\n{log}")]
pub struct RecoveryError {
    pub description: String,
    pub attempts: u32,
    pub log: String,
    #[source]
    pub last: Box<PipelineError>,
}

/// Every terminal error the control plane can return.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Planning(#[from] PlanningError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Segregation(#[from] SegregationViolation),
}

impl PipelineError {
    /// Stable kind name used in attempt summaries and CLI error output.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Command(_) => "CommandError",
            PipelineError::Planning(_) => "PlanningError",
            PipelineError::Execution(_) => "ExecutionError",
            PipelineError::Recovery(_) => "RecoveryError",
            PipelineError::Segregation(_) => "SegregationViolation",
        }
    }

    /// Planning and execution failures are retried; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Planning(_) | PipelineError::Execution(_))
    }

    /// Innermost non-recovery error, following the retry chain.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Recovery(err) => err.last.root_cause(),
            other => other,
        }
    }
}
