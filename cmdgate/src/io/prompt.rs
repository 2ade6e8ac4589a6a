//! Prompt rendering for planning and code generation.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;

use crate::core::types::Action;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const CODE_GENERATE_TEMPLATE: &str = include_str!("prompts/code_generate.md");

#[derive(Debug, Clone, Serialize)]
struct ActionContext {
    name: &'static str,
    description: &'static str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for PromptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptEngine").finish_non_exhaustive()
    }
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("code_generate", CODE_GENERATE_TEMPLATE)
            .context("load code_generate template")?;
        Ok(Self { env })
    }

    /// Planning prompt listing the full action vocabulary.
    ///
    /// Output depends only on the inputs.
    pub fn render_planner(&self, instruction: &str, max_steps: Option<usize>) -> Result<String> {
        let actions: Vec<ActionContext> = Action::ALL
            .into_iter()
            .map(|action| ActionContext {
                name: action.as_str(),
                description: action.description(),
            })
            .collect();
        let template = self.env.get_template("planner")?;
        let rendered = template
            .render(context! {
                actions => actions,
                instruction => instruction.trim(),
                max_steps => max_steps,
            })
            .context("render planner prompt")?;
        Ok(rendered)
    }

    pub fn render_code_generate(
        &self,
        spec: &str,
        language: &str,
        context: &Value,
    ) -> Result<String> {
        let context_text = match context {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            other => Some(serde_json::to_string_pretty(other).context("serialize code context")?),
        };
        let template = self.env.get_template("code_generate")?;
        let rendered = template
            .render(context! {
                spec => spec.trim(),
                language => language,
                context => context_text,
            })
            .context("render code_generate prompt")?;
        Ok(rendered)
    }
}
