//! Temp-dir sandboxes and safe relative paths for file-writing tools.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Validate a tool-supplied file name as a relative path that stays inside its root.
pub fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if name.trim().is_empty() {
        bail!("file name must be non-empty");
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => bail!("file name must not contain '..': {name}"),
            Component::RootDir | Component::Prefix(_) => {
                bail!("file name must be relative: {name}")
            }
        }
    }
    if clean.as_os_str().is_empty() {
        bail!("file name must name a file: {name}");
    }
    Ok(clean)
}

/// Write `files` under `root`, creating parent directories. Returns written paths.
pub fn write_files(root: &Path, files: &BTreeMap<String, String>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = root.join(safe_relative_path(name)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Throwaway working directory removed on drop.
#[derive(Debug)]
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn with_files(files: &BTreeMap<String, String>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("cmdgate-sandbox-")
            .tempdir()
            .context("create sandbox dir")?;
        write_files(dir.path(), files)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run `program args..` with the sandbox as working directory.
    pub fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(self.path());
        run_command_with_timeout(cmd, None, timeout, output_limit_bytes)
            .with_context(|| format!("run {program} in sandbox"))
    }
}

/// Interpreter settings shared by the python-backed tools.
#[derive(Debug, Clone)]
pub struct PythonSettings {
    pub python: String,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}
