//! `code_validate`: byte-compile python sources to catch syntax errors.

use anyhow::Result;
use serde_json::{Value, json};

use super::sandbox::{PythonSettings, Sandbox, safe_relative_path};
use super::{Tool, files_field, object};
use crate::core::types::Payload;

#[derive(Debug, Clone)]
pub struct CodeValidate {
    settings: PythonSettings,
    args: Vec<String>,
}

impl CodeValidate {
    pub fn new(settings: PythonSettings) -> Self {
        Self {
            settings,
            args: ["-m", "py_compile"].map(String::from).to_vec(),
        }
    }

    /// Replace the arguments placed before each file name.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl Tool for CodeValidate {
    fn name(&self) -> &str {
        "code_validate"
    }

    fn run(&self, payload: &Payload) -> Result<Payload> {
        let files = files_field(payload)?;
        if files.is_empty() {
            return Ok(object(json!({
                "valid": false,
                "errors": [{"error": "No files provided"}],
            })));
        }
        if let Some(err) = files.keys().find_map(|name| safe_relative_path(name).err()) {
            return Ok(object(json!({
                "valid": false,
                "errors": [{"error": err.to_string()}],
            })));
        }

        let sandbox = Sandbox::with_files(&files)?;
        let mut errors: Vec<Value> = Vec::new();
        let mut validated = Vec::new();
        let mut skipped = Vec::new();

        for name in files.keys() {
            if !name.ends_with(".py") {
                skipped.push(name.clone());
                continue;
            }
            let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
            args.push(name);
            let output = sandbox.run(
                &self.settings.python,
                &args,
                self.settings.timeout,
                self.settings.output_limit_bytes,
            )?;
            if output.success() {
                validated.push(name.clone());
            } else {
                let message = if output.timed_out {
                    "validation timed out".to_string()
                } else {
                    output.stderr_text().trim().to_string()
                };
                errors.push(json!({"file": name, "error": message}));
            }
        }

        Ok(object(json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "validated_files": validated,
            "skipped_files": skipped,
            "total_files": files.len(),
        })))
    }
}
