//! `artifact_write`: persist generated files to disk.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use super::sandbox::{safe_relative_path, write_files};
use super::{Tool, files_field, object, str_field};
use crate::core::types::Payload;

/// Writes `files` under `output_dir` (payload) or the configured default.
#[derive(Debug, Clone)]
pub struct ArtifactWrite {
    default_dir: PathBuf,
}

impl ArtifactWrite {
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }
}

fn failure(error: impl Into<String>) -> Payload {
    object(json!({
        "success": false,
        "error": error.into(),
        "written": [],
    }))
}

impl Tool for ArtifactWrite {
    fn name(&self) -> &str {
        "artifact_write"
    }

    fn run(&self, payload: &Payload) -> Result<Payload> {
        let files = files_field(payload)?;
        if files.is_empty() {
            return Ok(failure("No files provided"));
        }
        if let Some(err) = files.keys().find_map(|name| safe_relative_path(name).err()) {
            return Ok(failure(err.to_string()));
        }

        let output_dir = str_field(payload, "output_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_dir.clone());
        let written = fs::create_dir_all(&output_dir)
            .with_context(|| format!("create output dir {}", output_dir.display()))
            .and_then(|()| write_files(&output_dir, &files));
        let written: Vec<String> = match written {
            Ok(paths) => paths.iter().map(|path| path.display().to_string()).collect(),
            Err(err) => {
                let message = format!("{err:#}");
                warn!(output_dir = %output_dir.display(), err = %message, "artifact write failed");
                return Ok(failure(message));
            }
        };

        info!(count = written.len(), output_dir = %output_dir.display(), "artifacts written");
        Ok(object(json!({
            "success": true,
            "written": written,
            "output_dir": output_dir.display().to_string(),
        })))
    }
}
