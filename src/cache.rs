//! On-disk cache for extension store listings.
//!
//! Each entry is one JSON file named after its key. Entries older than the
//! TTL (judged by file modification time) are treated as missing and
//! removed on read.

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::platform::cache_dir;

/// Default cache TTL in hours.
pub const DEFAULT_TTL_HOURS: u64 = 24;

pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// Cache in the platform cache directory.
    pub fn new(ttl_hours: u64) -> Self {
        Self::in_dir(cache_dir(), Duration::from_secs(ttl_hours * 3600))
    }

    pub fn in_dir(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.json", file))
    }

    fn is_expired(&self, path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }

    /// Returns the cached value, or `None` when missing, expired or
    /// unreadable.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        if !path.is_file() {
            return None;
        }

        if self.is_expired(&path) {
            let _ = fs::remove_file(&path);
            return None;
        }

        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(key), serde_json::to_string(value)?)?;
        Ok(())
    }

    /// Removes every entry and returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_HOURS)
    }
}
