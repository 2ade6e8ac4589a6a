//! `code_execute`: run python files in a throwaway sandbox.

use anyhow::Result;
use serde_json::json;
use tracing::debug;

use super::sandbox::{PythonSettings, Sandbox, safe_relative_path};
use super::{Tool, files_field, object, str_field};
use crate::core::types::Payload;

pub const DEFAULT_ENTRY: &str = "main.py";

#[derive(Debug, Clone)]
pub struct CodeExecute {
    settings: PythonSettings,
}

impl CodeExecute {
    pub fn new(settings: PythonSettings) -> Self {
        Self { settings }
    }
}

fn failure(error: impl Into<String>) -> Payload {
    object(json!({
        "success": false,
        "error": error.into(),
        "stdout": "",
        "stderr": "",
        "returncode": -1,
    }))
}

impl Tool for CodeExecute {
    fn name(&self) -> &str {
        "code_execute"
    }

    fn run(&self, payload: &Payload) -> Result<Payload> {
        let files = files_field(payload)?;
        if files.is_empty() {
            return Ok(failure("No files provided"));
        }
        let entry = str_field(payload, "entry").unwrap_or(DEFAULT_ENTRY);
        let entry_path = match safe_relative_path(entry) {
            Ok(path) => path,
            Err(err) => return Ok(failure(err.to_string())),
        };
        if let Some(err) = files.keys().find_map(|name| safe_relative_path(name).err()) {
            return Ok(failure(err.to_string()));
        }

        let sandbox = Sandbox::with_files(&files)?;
        let entry_arg = entry_path.display().to_string();
        debug!(entry = %entry_arg, sandbox = %sandbox.path().display(), "executing code");
        let output = sandbox.run(
            &self.settings.python,
            &[entry_arg.as_str()],
            self.settings.timeout,
            self.settings.output_limit_bytes,
        )?;

        if output.timed_out {
            return Ok(failure(format!(
                "Execution timed out after {}s",
                self.settings.timeout.as_secs()
            )));
        }
        Ok(object(json!({
            "success": output.success(),
            "stdout": output.stdout_text(),
            "stderr": output.stderr_text(),
            "returncode": output.exit_code(),
        })))
    }
}
