//! Minimal `GarminClient` trait and a reqwest-based Garmin Connect client.

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::SecretString;
use std::path::Path;
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod retry;
pub mod sso;
pub mod token;

#[derive(Debug, Error)]
pub enum GarminError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("not found: {0}")]
    NotFound(String),
    /// The endpoint answered 204: nothing recorded yet.
    #[error("no content")]
    NoContent,
    #[error("sso error: {0}")]
    Sso(String),
    #[error("token store error: {0}")]
    TokenStore(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl GarminError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => GarminError::Auth(body),
            404 => GarminError::NotFound(body),
            429 => GarminError::RateLimited(body),
            _ => GarminError::Api { status, body },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GarminError::RateLimited(_))
    }
}

impl From<reqwest::Error> for GarminError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            return GarminError::Connection(err.to_string());
        }
        if let Some(status) = err.status() {
            return GarminError::from_status(status.as_u16(), err.to_string());
        }
        GarminError::Http(err)
    }
}

/// Health metrics fetched one calendar date at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DailyMetric {
    Summary,
    HeartRate,
    Sleep,
    Stress,
    Respiration,
    Spo2,
    Hrv,
    TrainingReadiness,
    Hydration,
    IntensityMinutes,
    Floors,
    StepsDetail,
}

impl DailyMetric {
    /// Every single-date metric, in the order they are synced.
    pub const ALL: [DailyMetric; 12] = [
        DailyMetric::Summary,
        DailyMetric::HeartRate,
        DailyMetric::Sleep,
        DailyMetric::Stress,
        DailyMetric::Respiration,
        DailyMetric::Spo2,
        DailyMetric::Hrv,
        DailyMetric::TrainingReadiness,
        DailyMetric::Hydration,
        DailyMetric::IntensityMinutes,
        DailyMetric::Floors,
        DailyMetric::StepsDetail,
    ];

    /// Stable document name used for the cached file (without extension).
    pub fn name(self) -> &'static str {
        match self {
            DailyMetric::Summary => "summary",
            DailyMetric::HeartRate => "heart_rate",
            DailyMetric::Sleep => "sleep",
            DailyMetric::Stress => "stress",
            DailyMetric::Respiration => "respiration",
            DailyMetric::Spo2 => "spo2",
            DailyMetric::Hrv => "hrv",
            DailyMetric::TrainingReadiness => "training_readiness",
            DailyMetric::Hydration => "hydration",
            DailyMetric::IntensityMinutes => "intensity_minutes",
            DailyMetric::Floors => "floors",
            DailyMetric::StepsDetail => "steps_detail",
        }
    }
}

impl std::fmt::Display for DailyMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Extract the numeric `activityId` of an activity record.
///
/// The activity list endpoints return the ID as a number, but older payloads
/// and some exports carry it as a string, so both are accepted. Zero is not
/// a real ID and is treated as missing.
pub fn activity_id(activity: &serde_json::Value) -> Option<u64> {
    let id = match activity.get("activityId")? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id != 0)
}

#[async_trait]
pub trait GarminClient: Send + Sync + 'static {
    /// Fetch one single-date health metric.
    async fn get_daily_metric(
        &self,
        metric: DailyMetric,
        date: NaiveDate,
    ) -> Result<serde_json::Value, GarminError>;

    /// Body battery reports for an inclusive date range.
    async fn get_body_battery(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, GarminError>;

    // === Activities ===

    /// One page of the activity list, newest first.
    async fn get_activities(
        &self,
        start: u32,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, GarminError>;

    /// Activities whose start date falls in the inclusive range.
    async fn get_activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<serde_json::Value>, GarminError>;

    /// Full detail of a single activity.
    async fn get_activity(&self, activity_id: u64) -> Result<serde_json::Value, GarminError>;

    // === Body composition ===

    async fn get_body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, GarminError>;

    async fn get_weigh_ins(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, GarminError>;

    // === Weekly trends ===

    async fn get_weekly_steps(
        &self,
        end: NaiveDate,
        weeks: u32,
    ) -> Result<serde_json::Value, GarminError>;

    async fn get_weekly_stress(
        &self,
        end: NaiveDate,
        weeks: u32,
    ) -> Result<serde_json::Value, GarminError>;

    // === Profile ===

    async fn get_user_profile(&self) -> Result<serde_json::Value, GarminError>;
    async fn get_devices(&self) -> Result<serde_json::Value, GarminError>;
    async fn get_personal_records(&self) -> Result<serde_json::Value, GarminError>;
}

/// Result of a primary credential login.
#[derive(Debug)]
pub enum LoginOutcome<C, M> {
    Authenticated(C),
    /// The account requires a one-time code; resume with the challenge.
    NeedsMfa(M),
}

/// Session establishment against the provider's single sign-on.
#[async_trait]
pub trait Authenticator: Send + Sync {
    type Client: GarminClient;
    type Challenge: Send;

    /// Rebuild a client from a previously persisted token bundle.
    async fn restore(&self, token_dir: &Path) -> Result<Self::Client, GarminError>;

    async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome<Self::Client, Self::Challenge>, GarminError>;

    async fn resume_login(
        &self,
        challenge: Self::Challenge,
        code: &str,
    ) -> Result<Self::Client, GarminError>;

    /// Store the client's token bundle for reuse by later runs.
    async fn persist(&self, client: &Self::Client, token_dir: &Path) -> Result<(), GarminError>;
}
