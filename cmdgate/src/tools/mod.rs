//! Tool interface, the name-keyed tool registry and the built-in tools.
//!
//! Tools report user-level problems (no files, unknown topic, failing tests)
//! inside their result payload, usually as `success: false` plus `error`.
//! An `Err` is reserved for failures of the tool itself (spawn or sandbox
//! errors, malformed payload types) and aborts the step.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde_json::Value;

use crate::core::types::Payload;
use crate::error::ToolNotFound;

pub mod artifact_write;
pub mod code_execute;
pub mod code_generate;
pub mod code_validate;
pub mod external;
pub mod notebook_query;
pub mod sandbox;

/// Handler for one step action.
pub trait Tool {
    fn name(&self) -> &str;

    fn run(&self, payload: &Payload) -> Result<Payload>;
}

/// Name to tool table, filled at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool under its own name, replacing any previous one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Tool, ToolNotFound> {
        self.tools
            .get(name)
            .map(|tool| tool.as_ref())
            .ok_or_else(|| ToolNotFound {
                name: name.to_string(),
                available: if self.tools.is_empty() {
                    "none".to_string()
                } else {
                    self.list().join(", ")
                },
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

/// Object payload from a JSON value; non-objects give an empty map.
pub fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Optional string field; empty or whitespace-only strings read as absent.
pub fn str_field<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// `files` field as name to content. Missing or null is empty.
pub fn files_field(payload: &Payload) -> Result<BTreeMap<String, String>> {
    let map = match payload.get("files") {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(other) => bail!("files must be an object of name to content, got {other}"),
    };
    let mut files = BTreeMap::new();
    for (name, content) in map {
        let Some(content) = content.as_str() else {
            bail!("file {name}: content must be a string");
        };
        files.insert(name.clone(), content.to_string());
    }
    Ok(files)
}
