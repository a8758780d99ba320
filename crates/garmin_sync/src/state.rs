use crate::{SyncError, SyncResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SyncState {
    #[serde(default)]
    last_sync_date: Option<String>,
}

/// Persists the date of the last completed sync.
#[derive(Clone, Debug)]
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no run has completed yet.
    pub async fn load(&self) -> SyncResult<Option<NaiveDate>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };
        let state: SyncState = serde_json::from_slice(&raw)
            .map_err(|e| SyncError::State(format!("{}: {}", self.path.display(), e)))?;
        // An empty date is the same as no previous run.
        match state.last_sync_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| SyncError::State(format!("{}: {}: {}", self.path.display(), raw, e))),
        }
    }

    pub async fn save(&self, date: NaiveDate) -> SyncResult<()> {
        let state = SyncState {
            last_sync_date: Some(date.format("%Y-%m-%d").to_string()),
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(&state)?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| SyncError::io(&self.path, e))
    }
}
