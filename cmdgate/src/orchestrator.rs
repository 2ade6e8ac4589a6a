//! Plan-then-execute for one instruction.

use tracing::{info, instrument};

use crate::core::types::{ExecutionContext, ExecutionTrace};
use crate::error::PipelineError;
use crate::planner::Planner;
use crate::recovery::FailureRecovery;
use crate::step_executor::StepExecutor;

/// Characters of the instruction quoted in retry descriptions.
const DESCRIPTION_CHARS: usize = 50;

#[derive(Debug)]
pub struct Orchestrator {
    planner: Planner,
    executor: StepExecutor,
    recovery: FailureRecovery,
}

impl Orchestrator {
    pub fn new(planner: Planner, executor: StepExecutor, recovery: FailureRecovery) -> Self {
        Self {
            planner,
            executor,
            recovery,
        }
    }

    /// Plan and execute as one retried unit.
    ///
    /// A failed attempt is retried from planning, so backends are queried
    /// again and side effects of steps that completed in the failed attempt
    /// are not undone.
    #[instrument(skip_all, fields(conversation_id))]
    pub fn execute(
        &self,
        conversation_id: &str,
        instruction: &str,
    ) -> Result<ExecutionContext, PipelineError> {
        let description = format!("instruction execution: {}...", preview(instruction));
        self.recovery.retry(
            || self.attempt(conversation_id, instruction).map(|trace| trace.results),
            &description,
        )
    }

    /// Single unretried attempt returning the plan alongside its results.
    #[instrument(skip_all, fields(conversation_id))]
    pub fn execute_with_plan(
        &self,
        conversation_id: &str,
        instruction: &str,
    ) -> Result<ExecutionTrace, PipelineError> {
        self.attempt(conversation_id, instruction)
    }

    fn attempt(
        &self,
        conversation_id: &str,
        instruction: &str,
    ) -> Result<ExecutionTrace, PipelineError> {
        let plan = self.planner.plan(instruction)?;
        info!(steps = plan.len(), "plan ready");
        let results = self.executor.execute(conversation_id, &plan)?;
        Ok(ExecutionTrace { plan, results })
    }
}

fn preview(instruction: &str) -> &str {
    match instruction.char_indices().nth(DESCRIPTION_CHARS) {
        Some((end, _)) => &instruction[..end],
        None => instruction,
    }
}
