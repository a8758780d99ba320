//! OAuth2 token bundle and its on-disk store.

use crate::GarminError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const TOKEN_FILE: &str = "oauth2_token.json";

/// Bearer credentials issued after a successful SSO login.
#[derive(Clone, Debug)]
pub struct OAuthToken {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: i64,
    pub refresh_token_expires_at: Option<i64>,
}

impl OAuthToken {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Whether a refresh token is held and has not itself expired.
    pub fn can_refresh(&self, now: i64) -> bool {
        self.refresh_token.is_some()
            && self.refresh_token_expires_at.is_none_or(|at| at > now)
    }
}

/// Token payload as returned by the exchange endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token_expires_in: Option<i64>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl TokenResponse {
    pub(crate) fn into_token(self, now: i64) -> OAuthToken {
        OAuthToken {
            access_token: SecretString::new(self.access_token.into()),
            refresh_token: self.refresh_token.map(|t| SecretString::new(t.into())),
            token_type: self.token_type,
            expires_at: now + self.expires_in,
            refresh_token_expires_at: self.refresh_token_expires_in.map(|s| now + s),
        }
    }
}

/// Serialized form; secrets only leave `SecretString` here.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_at: i64,
    refresh_token_expires_at: Option<i64>,
}

/// Directory holding the persisted token bundle.
#[derive(Clone, Debug)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn load(&self) -> Result<OAuthToken, GarminError> {
        let path = self.path();
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| GarminError::TokenStore(format!("{}: {}", path.display(), e)))?;
        let stored: StoredToken = serde_json::from_slice(&raw)
            .map_err(|e| GarminError::TokenStore(format!("{}: {}", path.display(), e)))?;
        Ok(OAuthToken {
            access_token: SecretString::new(stored.access_token.into()),
            refresh_token: stored.refresh_token.map(|t| SecretString::new(t.into())),
            token_type: stored.token_type,
            expires_at: stored.expires_at,
            refresh_token_expires_at: stored.refresh_token_expires_at,
        })
    }

    pub async fn save(&self, token: &OAuthToken) -> Result<(), GarminError> {
        let stored = StoredToken {
            access_token: token.access_token.expose_secret().to_string(),
            refresh_token: token
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            token_type: token.token_type.clone(),
            expires_at: token.expires_at,
            refresh_token_expires_at: token.refresh_token_expires_at,
        };
        let body = serde_json::to_vec_pretty(&stored)
            .map_err(|e| GarminError::TokenStore(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GarminError::TokenStore(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.path();
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| GarminError::TokenStore(format!("{}: {}", path.display(), e)))
    }
}
