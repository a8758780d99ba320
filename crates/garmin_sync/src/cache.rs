//! Flat-file document store.
//!
//! Every document lives at a path derived from its category, date or id,
//! and metric name. Existence of the file is the only cache signal; callers
//! check [`FileCache::exists`] before fetching and never inspect content.

use crate::{SyncError, SyncResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct FileCache {
    base_dir: PathBuf,
}

impl FileCache {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `daily/<date>/<name>.json`
    pub fn daily_path(&self, date: NaiveDate, name: &str) -> PathBuf {
        self.base_dir
            .join("daily")
            .join(date.to_string())
            .join(format!("{name}.json"))
    }

    /// `activities/<id>.json`
    pub fn activity_path(&self, activity_id: u64) -> PathBuf {
        self.base_dir
            .join("activities")
            .join(format!("{activity_id}.json"))
    }

    /// `<category>/<name>.json`, or `<name>.json` at the root.
    pub fn document_path(&self, category: Option<&str>, name: &str) -> PathBuf {
        let dir = match category {
            Some(c) => self.base_dir.join(c),
            None => self.base_dir.clone(),
        };
        dir.join(format!("{name}.json"))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Write `value` as pretty-printed JSON, replacing any existing file.
    pub async fn write<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, body)
            .await
            .map_err(|e| SyncError::io(path, e))
    }
}
