//! Single external entry point: validate the command envelope, then execute.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::types::{ExecutionContext, ExecutionTrace};
use crate::error::{CommandError, PipelineError};
use crate::orchestrator::Orchestrator;

pub const EXECUTE_COMMAND: &str = "EXECUTE";
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Envelope fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub conversation_id: String,
    pub instructions: String,
}

/// Check `{command: "EXECUTE", conversation_id?, instructions}`.
///
/// `conversation_id` defaults to `"default"`. Instructions that are empty or
/// whitespace-only are rejected.
pub fn validate_envelope(payload: &Value) -> Result<CommandRequest, CommandError> {
    let Value::Object(map) = payload else {
        return Err(CommandError("command payload must be a JSON object".to_string()));
    };

    match map.get("command") {
        Some(Value::String(cmd)) if cmd == EXECUTE_COMMAND => {}
        Some(Value::String(cmd)) => {
            return Err(CommandError(format!(
                "only {EXECUTE_COMMAND} command allowed, got: {cmd}"
            )));
        }
        Some(other) => {
            return Err(CommandError(format!(
                "only {EXECUTE_COMMAND} command allowed, got: {other}"
            )));
        }
        None => {
            return Err(CommandError(format!(
                "only {EXECUTE_COMMAND} command allowed, got: none"
            )));
        }
    }

    let conversation_id = match map.get("conversation_id") {
        None | Some(Value::Null) => DEFAULT_CONVERSATION_ID.to_string(),
        Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
        Some(Value::String(_)) => DEFAULT_CONVERSATION_ID.to_string(),
        Some(_) => return Err(CommandError("conversation_id must be a string".to_string())),
    };

    let instructions = match map.get("instructions") {
        Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
        _ => return Err(CommandError("no instructions provided".to_string())),
    };

    Ok(CommandRequest {
        conversation_id,
        instructions,
    })
}

#[derive(Debug)]
pub struct ControlPlane {
    orchestrator: Orchestrator,
}

impl ControlPlane {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Validate and execute with retry. Returns a context with every step run.
    #[instrument(skip_all)]
    pub fn handle(&self, payload: &Value) -> Result<ExecutionContext, PipelineError> {
        let request = validate_envelope(payload).inspect_err(|err| {
            warn!(err = %err, "command rejected");
        })?;
        info!(conversation_id = %request.conversation_id, "command accepted");
        self.orchestrator
            .execute(&request.conversation_id, &request.instructions)
    }

    /// Validate and run one unretried attempt, returning the plan too.
    #[instrument(skip_all)]
    pub fn handle_with_trace(&self, payload: &Value) -> Result<ExecutionTrace, PipelineError> {
        let request = validate_envelope(payload).inspect_err(|err| {
            warn!(err = %err, "command rejected");
        })?;
        info!(conversation_id = %request.conversation_id, "traced command accepted");
        self.orchestrator
            .execute_with_plan(&request.conversation_id, &request.instructions)
    }
}
