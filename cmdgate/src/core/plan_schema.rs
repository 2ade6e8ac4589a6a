//! Plan extraction and schema validation for raw backend text.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::types::Step;

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.schema.json");

/// Default upper bound on plan length.
pub const DEFAULT_MAX_STEPS: usize = 20;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_-]*)[ \t]*\r?\n?(.*?)```").expect("fence regex is valid")
});

/// Why one backend's text was not accepted as a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanRejection {
    #[error("no JSON object found")]
    NoJson,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),
    #[error("plan has {count} steps, limit is {limit}")]
    TooManySteps { count: usize, limit: usize },
}

#[derive(Debug, Deserialize)]
struct PlanDocument {
    steps: Vec<Step>,
}

/// Parsed plan schema.
pub fn plan_schema() -> Result<Value> {
    serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")
}

/// Carve the candidate JSON object out of free-form text.
///
/// Prefers a fence tagged `json`, else the first fenced block, else the raw
/// text. Keeps the span from the first `{` to the last `}`; when the chosen
/// fence holds no such span the whole text is searched instead.
pub fn extract_json(text: &str) -> Option<&str> {
    let text = text.trim();
    let fences: Vec<_> = FENCE_RE.captures_iter(text).collect();
    let fenced = fences
        .iter()
        .find(|caps| {
            caps.get(1)
                .is_some_and(|tag| tag.as_str().eq_ignore_ascii_case("json"))
        })
        .or_else(|| fences.first())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim());

    fenced.and_then(brace_span).or_else(|| brace_span(text))
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Compiled plan schema plus the step limit.
pub struct PlanValidator {
    validator: Validator,
    max_steps: usize,
}

impl std::fmt::Debug for PlanValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanValidator")
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl PlanValidator {
    pub fn new(max_steps: usize) -> Result<Self> {
        let schema = plan_schema()?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .context("compile plan schema")?;
        Ok(Self {
            validator,
            max_steps,
        })
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Validate one backend's raw output and return its steps.
    ///
    /// A returned list is never empty: the schema requires at least one step.
    pub fn validate_text(&self, text: &str) -> Result<Vec<Step>, PlanRejection> {
        let candidate = extract_json(text).ok_or(PlanRejection::NoJson)?;
        let instance: Value = serde_json::from_str(candidate)
            .map_err(|err| PlanRejection::InvalidJson(err.to_string()))?;
        self.validate_value(instance)
    }

    pub fn validate_value(&self, instance: Value) -> Result<Vec<Step>, PlanRejection> {
        let messages: Vec<String> = self
            .validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(PlanRejection::Schema(messages));
        }

        let plan: PlanDocument = serde_json::from_value(instance)
            .map_err(|err| PlanRejection::Schema(vec![err.to_string()]))?;
        if plan.steps.len() > self.max_steps {
            return Err(PlanRejection::TooManySteps {
                count: plan.steps.len(),
                limit: self.max_steps,
            });
        }
        Ok(plan.steps)
    }
}
