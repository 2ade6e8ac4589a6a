//! Sequential plan execution against the capability and tool registries.

use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::capabilities::CapabilityRegistry;
use crate::core::types::{ExecutionContext, Payload, Step};
use crate::error::ExecutionError;
use crate::tools::ToolRegistry;

#[derive(Debug, Clone)]
pub struct StepExecutor {
    capabilities: Rc<CapabilityRegistry>,
    tools: Rc<ToolRegistry>,
}

impl StepExecutor {
    pub fn new(capabilities: Rc<CapabilityRegistry>, tools: Rc<ToolRegistry>) -> Self {
        Self {
            capabilities,
            tools,
        }
    }

    /// Run every step in order; the first failure aborts the attempt.
    ///
    /// Per step: capability check, then tool lookup, then the tool call. The
    /// tool sees its payload plus `conversation_id` and a snapshot of the
    /// context so far. Nothing written by earlier steps is rolled back.
    #[instrument(skip_all, fields(conversation_id, steps = steps.len()))]
    pub fn execute(
        &self,
        conversation_id: &str,
        steps: &[Step],
    ) -> Result<ExecutionContext, ExecutionError> {
        let mut ctx = ExecutionContext::new(conversation_id, steps.len());

        for (index, step) in steps.iter().enumerate() {
            let fail = |message: String| {
                warn!(index, action = %step.action, %message, "step failed");
                ExecutionError {
                    index,
                    action: step.action.clone(),
                    steps_executed: ctx.steps_executed(),
                    message,
                }
            };

            if let Err(err) = self.capabilities.assert_capability(&step.action) {
                return Err(fail(format!(
                    "step {index} ({}): capability check failed - {err}",
                    step.action
                )));
            }
            let tool = match self.tools.get(&step.action) {
                Ok(tool) => tool,
                Err(err) => {
                    return Err(fail(format!(
                        "step {index} ({}): tool not found - {err}",
                        step.action
                    )));
                }
            };

            debug!(index, action = %step.action, "running step");
            let input = tool_input(step, &ctx);
            let result = match tool.run(&input) {
                Ok(result) => result,
                Err(err) => {
                    return Err(fail(format!(
                        "step {index} ({}) failed: {err:#}",
                        step.action
                    )));
                }
            };
            ctx.record(index, step, result);
        }

        info!(steps_executed = ctx.steps_executed(), "plan executed");
        Ok(ctx)
    }
}

fn tool_input(step: &Step, ctx: &ExecutionContext) -> Payload {
    let mut input = step.payload.clone();
    input.insert(
        "conversation_id".to_string(),
        Value::String(ctx.conversation_id().to_string()),
    );
    input.insert("context".to_string(), ctx.to_value());
    input
}
