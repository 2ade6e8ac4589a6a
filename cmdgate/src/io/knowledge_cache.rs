//! Local knowledge cache keyed by topic.
//!
//! Each topic lives in `<sha256(topic)>.json` under the cache root. Entries
//! that fail to parse are treated as absent.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub const CACHE_ENTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub topic: String,
    pub data: Value,
    /// RFC 3339 UTC timestamp.
    pub stored_at: String,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: u64,
    pub cache_dir: String,
}

#[derive(Debug, Clone)]
pub struct KnowledgeCache {
    root: PathBuf,
}

impl KnowledgeCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Hex SHA-256 of the topic.
    pub fn key(topic: &str) -> String {
        hex::encode(Sha256::digest(topic.as_bytes()))
    }

    fn entry_path(&self, topic: &str) -> PathBuf {
        self.root.join(format!("{}.json", Self::key(topic)))
    }

    /// Store `data` under `topic`, replacing any previous entry. Returns the key.
    pub fn store(&self, topic: &str, data: Value) -> Result<String> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create cache dir {}", self.root.display()))?;
        let entry = CacheEntry {
            topic: topic.to_string(),
            data,
            stored_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            version: CACHE_ENTRY_VERSION,
        };
        let key = Self::key(topic);
        let path = self.root.join(format!("{key}.json"));
        let mut payload = serde_json::to_string_pretty(&entry).context("serialize cache entry")?;
        payload.push('\n');

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, payload)
            .with_context(|| format!("write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| format!("replace {}", path.display()))?;
        debug!(topic, key = %key, "stored cache entry");
        Ok(key)
    }

    pub fn load(&self, topic: &str) -> Result<Option<Value>> {
        Ok(self.load_with_metadata(topic)?.map(|entry| entry.data))
    }

    pub fn load_with_metadata(&self, topic: &str) -> Result<Option<CacheEntry>> {
        read_entry(&self.entry_path(topic))
    }

    pub fn exists(&self, topic: &str) -> bool {
        self.entry_path(topic).is_file()
    }

    /// Remove one topic. Returns `false` if it was not cached.
    pub fn delete(&self, topic: &str) -> Result<bool> {
        let path = self.entry_path(topic);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        Ok(true)
    }

    /// Remove every entry. Returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        let mut count = 0;
        for path in self.entry_files()? {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Topics of all readable entries, sorted.
    pub fn list_topics(&self) -> Result<Vec<String>> {
        let mut topics = Vec::new();
        for path in self.entry_files()? {
            if let Some(entry) = read_entry(&path)? {
                topics.push(entry.topic);
            }
        }
        topics.sort();
        Ok(topics)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let files = self.entry_files()?;
        let mut total_size_bytes = 0;
        for path in &files {
            let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
            total_size_bytes += meta.len();
        }
        let cache_dir = fs::canonicalize(&self.root)
            .unwrap_or_else(|_| self.root.clone())
            .display()
            .to_string();
        Ok(CacheStats {
            entries: files.len(),
            total_size_bytes,
            cache_dir,
        })
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let dir = fs::read_dir(&self.root)
            .with_context(|| format!("read cache dir {}", self.root.display()))?;
        for entry in dir {
            let path = entry.context("read cache dir entry")?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    match serde_json::from_str(&raw) {
        Ok(entry) => Ok(Some(entry)),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "ignoring corrupt cache entry");
            Ok(None)
        }
    }
}
