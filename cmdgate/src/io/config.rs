//! Pipeline configuration stored under `.cmdgate/config.toml`.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::plan_schema::DEFAULT_MAX_STEPS;
use crate::core::segregation::{DEFAULT_AI_ALLOWED_CONTEXTS, DEFAULT_AI_PROHIBITED_CONTEXTS};

pub const DEFAULT_CONFIG_PATH: &str = ".cmdgate/config.toml";
/// Overrides the config file location.
pub const CONFIG_ENV: &str = "CMDGATE_CONFIG";
/// Overrides `router.strategy`.
pub const STRATEGY_ENV: &str = "CMDGATE_STRATEGY";

/// Pipeline configuration (TOML).
///
/// Missing sections and fields take their defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub router: RouterConfig,
    pub execution: ExecutionConfig,
    pub segregation: SegregationConfig,
    /// Capability overrides applied on top of the built-in table.
    pub capabilities: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ExternalToolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouterConfig {
    /// Strategy used by tools that generate text (`code_generate`).
    /// Planning always sweeps backends in fallback order.
    pub strategy: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: "fallback".to_string(),
        }
    }
}

/// One command-driven generation backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub name: String,
    /// Program and arguments (e.g. `["llm", "-m", "gpt-4o"]`).
    pub command: Vec<String>,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Tool backed by an external command speaking JSON over stdin/stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalToolConfig {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock limit for `code_execute`.
    pub sandbox_timeout_secs: u64,
    /// Wall-clock limit for `run_tests`.
    pub test_timeout_secs: u64,
    /// Plans longer than this are rejected.
    pub max_steps: usize,
    /// Default destination for `artifact_write`.
    pub artifact_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Interpreter used by the sandboxed tools.
    pub python: String,
    /// Truncate captured child stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            sandbox_timeout_secs: 30,
            test_timeout_secs: 60,
            max_steps: DEFAULT_MAX_STEPS,
            artifact_dir: PathBuf::from("artifacts"),
            cache_dir: PathBuf::from("knowledge_cache"),
            python: "python".to_string(),
            output_limit_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SegregationConfig {
    pub ai_allowed: Vec<String>,
    pub ai_prohibited: Vec<String>,
}

impl Default for SegregationConfig {
    fn default() -> Self {
        Self {
            ai_allowed: DEFAULT_AI_ALLOWED_CONTEXTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ai_prohibited: DEFAULT_AI_PROHIBITED_CONTEXTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn default_backend_timeout() -> u64 {
    120
}

fn default_tool_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let exec = &self.execution;
        if exec.sandbox_timeout_secs == 0 {
            return Err(anyhow!("execution.sandbox_timeout_secs must be > 0"));
        }
        if exec.test_timeout_secs == 0 {
            return Err(anyhow!("execution.test_timeout_secs must be > 0"));
        }
        if exec.max_steps == 0 {
            return Err(anyhow!("execution.max_steps must be > 0"));
        }
        if exec.output_limit_bytes == 0 {
            return Err(anyhow!("execution.output_limit_bytes must be > 0"));
        }
        if exec.python.trim().is_empty() {
            return Err(anyhow!("execution.python must be non-empty"));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            check_command("backends", &backend.name, &backend.command, backend.timeout_secs)?;
            if !seen.insert(backend.name.as_str()) {
                return Err(anyhow!("duplicate backend name: {}", backend.name));
            }
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            check_command("tools", &tool.name, &tool.command, tool.timeout_secs)?;
            if !seen.insert(tool.name.as_str()) {
                return Err(anyhow!("duplicate tool name: {}", tool.name));
            }
        }
        Ok(())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(strategy) = lookup(STRATEGY_ENV).filter(|s| !s.trim().is_empty()) {
            self.router.strategy = strategy.trim().to_string();
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }
}

fn check_command(section: &str, name: &str, command: &[String], timeout_secs: u64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("{section}: name must be non-empty"));
    }
    if command.first().is_none_or(|program| program.trim().is_empty()) {
        return Err(anyhow!("{section}.{name}: command must be a non-empty array"));
    }
    if timeout_secs == 0 {
        return Err(anyhow!("{section}.{name}: timeout_secs must be > 0"));
    }
    Ok(())
}

/// Config path from the CLI flag, then `CMDGATE_CONFIG`, then the default.
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    match env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
