//! `notebook_query`: look a topic up in the knowledge cache.

use anyhow::Result;
use serde_json::{Value, json};

use super::{Tool, object, str_field};
use crate::core::types::Payload;
use crate::io::knowledge_cache::KnowledgeCache;

#[derive(Debug, Clone)]
pub struct NotebookQuery {
    cache: KnowledgeCache,
}

impl NotebookQuery {
    pub fn new(cache: KnowledgeCache) -> Self {
        Self { cache }
    }
}

impl Tool for NotebookQuery {
    fn name(&self) -> &str {
        "notebook_query"
    }

    fn run(&self, payload: &Payload) -> Result<Payload> {
        let Some(topic) = str_field(payload, "topic") else {
            return Ok(object(json!({
                "found": false,
                "error": "No topic provided",
                "data": null,
            })));
        };
        let data = self.cache.load(topic)?;
        Ok(object(json!({
            "found": data.is_some(),
            "topic": topic,
            "data": data.unwrap_or(Value::Null),
        })))
    }
}
