//! Plan generation: prompt the router, keep the first output that validates.

use std::rc::Rc;

use tracing::{debug, info, instrument};

use crate::core::plan_schema::PlanValidator;
use crate::core::types::Step;
use crate::error::PlanningError;
use crate::io::prompt::PromptEngine;
use crate::router::{BackendOutput, Router};

pub struct Planner {
    router: Rc<Router>,
    validator: PlanValidator,
    prompts: PromptEngine,
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("router", &self.router)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Planner {
    pub fn new(router: Rc<Router>, validator: PlanValidator) -> anyhow::Result<Self> {
        Ok(Self {
            router,
            validator,
            prompts: PromptEngine::new()?,
        })
    }

    /// Produce a validated, non-empty step list for `instruction`.
    ///
    /// Backends are swept in registration order at temperature 0 until one
    /// returns text that validates; backends after that are not called.
    #[instrument(skip_all, fields(instruction_len = instruction.len()))]
    pub fn plan(&self, instruction: &str) -> Result<Vec<Step>, PlanningError> {
        let prompt = self
            .prompts
            .render_planner(instruction, Some(self.validator.max_steps()))
            .map_err(|err| PlanningError(format!("render planning prompt: {err:#}")))?;

        let mut accepted = None;
        let mut reasons = Vec::new();
        let outputs = self.router.sweep(&prompt, 0.0, |text| {
            match self.validator.validate_text(text) {
                Ok(steps) => {
                    accepted = Some(steps);
                    true
                }
                Err(rejection) => {
                    reasons.push(rejection.to_string());
                    false
                }
            }
        });

        if let Some(steps) = accepted {
            // The sweep stops at the accepted output, so it is the last entry.
            let source = outputs.names().last().copied().unwrap_or("unknown");
            info!(backend = source, steps = steps.len(), "plan accepted");
            return Ok(steps);
        }

        let mut reasons = reasons.into_iter();
        let lines: Vec<String> = outputs
            .iter()
            .map(|(name, output)| match output {
                BackendOutput::Error(err) => format!("{name}: backend error: {err}"),
                BackendOutput::Text(_) => {
                    format!("{name}: {}", reasons.next().unwrap_or_default())
                }
            })
            .collect();
        debug!(rejections = lines.len(), "no valid plan");

        if lines.is_empty() {
            return Err(PlanningError(
                "no valid plan: no backends available".to_string(),
            ));
        }
        Err(PlanningError(format!(
            "no valid plan from any backend:\n- {}",
            lines.join("\n- ")
        )))
    }
}
