//! `code_generate`: ask the router for code and split it into files.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{Tool, object, str_field};
use crate::core::types::Payload;
use crate::io::prompt::PromptEngine;
use crate::router::Router;

const FILE_MARKER: &str = "# FILE:";
/// File name used when the output carries no `# FILE:` markers.
pub const FALLBACK_FILE: &str = "main.py";

/// Generates with the router's configured strategy.
pub struct CodeGenerate {
    router: Rc<Router>,
    prompts: PromptEngine,
}

impl std::fmt::Debug for CodeGenerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerate")
            .field("strategy", &self.router.strategy())
            .finish_non_exhaustive()
    }
}

impl CodeGenerate {
    pub fn new(router: Rc<Router>) -> Result<Self> {
        Ok(Self {
            router,
            prompts: PromptEngine::new()?,
        })
    }
}

/// Split `# FILE: name` sections. Text before the first marker is dropped.
pub fn parse_files(output: &str) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in output.lines() {
        if let Some(name) = line.strip_prefix(FILE_MARKER) {
            if let Some((name, body)) = current.take() {
                files.insert(name, body.join("\n"));
            }
            current = Some((name.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((name, body)) = current {
        files.insert(name, body.join("\n"));
    }

    files.retain(|name, _| !name.is_empty());
    if files.is_empty() {
        files.insert(FALLBACK_FILE.to_string(), output.to_string());
    }
    files
}

impl Tool for CodeGenerate {
    fn name(&self) -> &str {
        "code_generate"
    }

    fn run(&self, payload: &Payload) -> Result<Payload> {
        let Some(spec) = str_field(payload, "spec") else {
            return Ok(object(json!({"error": "No specification provided", "files": {}})));
        };
        let language = str_field(payload, "language").unwrap_or("python");
        let context = payload.get("context").cloned().unwrap_or(Value::Null);

        let prompt = self.prompts.render_code_generate(spec, language, &context)?;
        let outputs = self.router.generate_default(&prompt, 0.0);
        let Some((provider, text)) = outputs.first_text() else {
            warn!(strategy = %self.router.strategy(), "no backend produced code");
            return Ok(object(json!({"error": "All providers failed", "files": {}})));
        };

        let files = parse_files(text);
        debug!(provider, files = files.len(), "code generated");
        Ok(object(json!({
            "files": files,
            "provider": provider,
            "spec": spec,
        })))
    }
}
