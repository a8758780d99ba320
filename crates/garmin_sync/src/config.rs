use crate::session::PresetCredentials;
use crate::{SyncError, SyncResult};
use garmin_connect_client::retry::RetryPolicy;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HISTORY_DAYS: i64 = 365;
pub const API_DELAY: Duration = Duration::from_secs(1);
pub const ACTIVITY_BATCH_SIZE: u32 = 100;
pub const WEEKLY_WEEKS: u32 = 52;

/// Everything a sync run needs, resolved once at startup.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Root of the exported document tree.
    pub base_dir: PathBuf,
    /// Directory holding the persisted token bundle.
    pub token_dir: PathBuf,
    /// Size of the first-run window, in days before today.
    pub history_days: i64,
    /// Courtesy pause after every remote call.
    pub api_delay: Duration,
    pub batch_size: u32,
    pub weekly_weeks: u32,
    pub retry: RetryPolicy,
    /// `EMAIL` / `PASSWORD` from the environment, used for the first login attempt.
    pub credentials: PresetCredentials,
}

impl SyncConfig {
    /// Defaults rooted at `base_dir`, with no environment involved.
    pub fn new(base_dir: impl Into<PathBuf>, token_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            token_dir: token_dir.into(),
            history_days: HISTORY_DAYS,
            api_delay: API_DELAY,
            batch_size: ACTIVITY_BATCH_SIZE,
            weekly_weeks: WEEKLY_WEEKS,
            retry: RetryPolicy::default(),
            credentials: PresetCredentials::default(),
        }
    }

    pub fn from_env() -> SyncResult<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function. This avoids mutating global environment in tests.
    pub fn from_env_with<F>(mut get: F) -> SyncResult<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base_dir = match get("GARMIN_DATA_DIR") {
            Some(dir) => expand_home(&dir)?,
            None => home_dir()?.join("garmin_data"),
        };
        let token_dir = expand_home(&get("GARMINTOKENS").unwrap_or_else(|| "~/.garminconnect".into()))?;

        let mut cfg = Self::new(base_dir, token_dir);
        if let Some(raw) = get("GARMIN_SYNC_API_DELAY_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|_| {
                SyncError::Config(format!("GARMIN_SYNC_API_DELAY_MS is not a number: {raw}"))
            })?;
            cfg.api_delay = Duration::from_millis(ms);
        }

        cfg.credentials = PresetCredentials {
            email: get("EMAIL").filter(|s| !s.is_empty()),
            password: get("PASSWORD")
                .filter(|s| !s.is_empty())
                .map(|p| SecretString::new(p.into())),
        };
        Ok(cfg)
    }

    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join("sync_state.json")
    }
}

/// Tracing filter directives: `GARMIN_SYNC_LOG_LEVEL`, else `RUST_LOG`,
/// else `info`, with HTTP internals held at `warn`.
pub fn log_directives() -> String {
    log_directives_with(|k| std::env::var(k).ok())
}

pub fn log_directives_with<F>(mut get: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let level = get("GARMIN_SYNC_LOG_LEVEL")
        .or_else(|| get("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string());
    format!("{},hyper=warn,reqwest=warn", level)
}

fn home_dir() -> SyncResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| SyncError::Config("could not determine home directory".into()))
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(raw: &str) -> SyncResult<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => Ok(home_dir()?.join(rest)),
        None => Ok(Path::new(raw).to_path_buf()),
    }
}
