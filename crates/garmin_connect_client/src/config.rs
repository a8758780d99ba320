pub const DEFAULT_SSO_URL: &str = "https://sso.garmin.com";
pub const DEFAULT_API_URL: &str = "https://connectapi.garmin.com";

/// Endpoints of the Garmin Connect services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub sso_base_url: String,
    pub api_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sso_base_url: DEFAULT_SSO_URL.into(),
            api_base_url: DEFAULT_API_URL.into(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let sso_base_url = get("GARMIN_SSO_URL").unwrap_or_else(|| DEFAULT_SSO_URL.into());
        let api_base_url = get("GARMIN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        Self {
            sso_base_url: sso_base_url.trim_end_matches('/').to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }
}
