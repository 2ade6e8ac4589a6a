//! Generation backend interface and the command-driven implementation.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::BackendError;
use crate::io::process::run_command_with_timeout;

/// Environment variable carrying the sampling temperature to command backends.
pub const TEMPERATURE_ENV: &str = "CMDGATE_TEMPERATURE";

/// Text generation capability used by the router.
///
/// `connect` is called once by [`crate::router::Router::initialize`] before any
/// generation; backends that hold no client state keep the default.
pub trait GenerationBackend {
    fn connect(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, BackendError>;
}

/// Backend that runs a configured command per prompt.
///
/// The prompt is written to stdin and the trimmed stdout is the generated
/// text. The temperature is exported as [`TEMPERATURE_ENV`].
#[derive(Debug, Clone)]
pub struct CommandBackend {
    name: String,
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    program: Option<PathBuf>,
}

impl CommandBackend {
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
            program: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl GenerationBackend for CommandBackend {
    fn connect(&mut self) -> Result<(), BackendError> {
        let program = self
            .command
            .first()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                BackendError::Failed(format!("backend {} has an empty command", self.name))
            })?;
        let resolved = resolve_program(program).ok_or_else(|| {
            BackendError::Failed(format!("backend {}: program not found: {program}", self.name))
        })?;
        debug!(backend = %self.name, program = %resolved.display(), "backend connected");
        self.program = Some(resolved);
        Ok(())
    }

    #[instrument(skip_all, fields(backend = %self.name, prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, BackendError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| BackendError::NotConnected(self.name.clone()))?;

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..])
            .env(TEMPERATURE_ENV, temperature.to_string());

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| BackendError::Failed(format!("{}: {err:#}", self.name)))?;

        if output.timed_out {
            return Err(BackendError::TimedOut(self.timeout));
        }
        if !output.status.success() {
            return Err(BackendError::Failed(format!(
                "{} exited with code {}: {}",
                self.name,
                output.exit_code(),
                output.stderr_text().trim()
            )));
        }
        Ok(output.stdout_text().trim().to_string())
    }
}

/// Resolve a program name the way a shell would: paths as given, bare names via `PATH`.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
