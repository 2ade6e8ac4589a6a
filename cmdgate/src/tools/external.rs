//! Tools implemented by external commands speaking JSON.
//!
//! The step payload is written to stdin as one JSON object; the command must
//! print one JSON object on stdout and exit zero.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::instrument;

use super::Tool;
use crate::core::types::Payload;
use crate::io::process::run_command_with_timeout;

#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: String,
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ExternalTool {
    pub fn new(
        name: impl Into<String>,
        command: Vec<String>,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            name: name.into(),
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

impl Tool for ExternalTool {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(tool = %self.name))]
    fn run(&self, payload: &Payload) -> Result<Payload> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("tool {} has an empty command", self.name);
        };
        let input = serde_json::to_vec(payload).context("serialize tool payload")?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command_with_timeout(
            cmd,
            Some(&input),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run tool {}", self.name))?;
        if output.timed_out {
            bail!("tool {} timed out after {}s", self.name, self.timeout.as_secs());
        }
        if !output.status.success() {
            bail!(
                "tool {} exited with code {}: {}",
                self.name,
                output.exit_code(),
                output.stderr_text().trim()
            );
        }
        if output.stdout_truncated > 0 {
            bail!(
                "tool {} output exceeded {} bytes",
                self.name,
                self.output_limit_bytes
            );
        }

        let value: Value = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse tool {} output as JSON", self.name))?;
        match value {
            Value::Object(map) => Ok(map),
            other => bail!("tool {} must print a JSON object, got {other}", self.name),
        }
    }
}
