//! HTTP client implementation for the Garmin Connect API.
//!
//! This module provides a reqwest-based implementation of the [`GarminClient`](crate::GarminClient) trait.

use crate::token::OAuthToken;
use crate::{DailyMetric, GarminClient, GarminError};
use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::ExposeSecret;

/// Client for the Garmin Connect API using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestGarminClient {
    base_url: String,
    display_name: String,
    token: OAuthToken,
    client: reqwest::Client,
}

impl ReqwestGarminClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Connect API (e.g., "https://connectapi.garmin.com")
    /// * `display_name` - The user's display name, part of several endpoint paths
    /// * `token` - The OAuth2 bearer token obtained from SSO
    pub fn new(base_url: &str, display_name: impl Into<String>, token: OAuthToken) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("GCM-iOS-5.7.2.1")
            .build()
            .expect("reqwest client build should not fail");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            display_name: display_name.into(),
            token,
            client,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn token(&self) -> &OAuthToken {
        &self.token
    }

    /// Build an authenticated GET request for an API path.
    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(self.token.access_token.expose_secret())
    }

    /// Execute a request and expect a JSON response.
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GarminError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(error_from_response(resp).await);
        }
        // Some wellness endpoints answer 204 when the day has no data.
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(GarminError::NoContent);
        }
        Ok(resp.json::<T>().await?)
    }

    /// Path and query for a single-date metric.
    fn daily_metric_request(
        &self,
        metric: DailyMetric,
        date: NaiveDate,
    ) -> (String, Vec<(&'static str, String)>) {
        let d = date.to_string();
        let name = &self.display_name;
        match metric {
            DailyMetric::Summary => (
                format!("/usersummary-service/usersummary/daily/{name}"),
                vec![("calendarDate", d)],
            ),
            DailyMetric::HeartRate => (
                format!("/wellness-service/wellness/dailyHeartRate/{name}"),
                vec![("date", d)],
            ),
            DailyMetric::Sleep => (
                format!("/wellness-service/wellness/dailySleepData/{name}"),
                vec![("date", d), ("nonSleepBufferMinutes", "60".into())],
            ),
            DailyMetric::Stress => (format!("/wellness-service/wellness/dailyStress/{d}"), vec![]),
            DailyMetric::Respiration => (
                format!("/wellness-service/wellness/daily/respiration/{d}"),
                vec![],
            ),
            DailyMetric::Spo2 => (format!("/wellness-service/wellness/daily/spo2/{d}"), vec![]),
            DailyMetric::Hrv => (format!("/hrv-service/hrv/{d}"), vec![]),
            DailyMetric::TrainingReadiness => (
                format!("/metrics-service/metrics/trainingreadiness/{d}"),
                vec![],
            ),
            DailyMetric::Hydration => (
                format!("/usersummary-service/usersummary/hydration/daily/{d}"),
                vec![],
            ),
            DailyMetric::IntensityMinutes => {
                (format!("/wellness-service/wellness/daily/im/{d}"), vec![])
            }
            DailyMetric::Floors => (
                format!("/wellness-service/wellness/floorsChartData/daily/{d}"),
                vec![],
            ),
            DailyMetric::StepsDetail => (
                format!("/wellness-service/wellness/dailySummaryChart/{name}"),
                vec![("date", d)],
            ),
        }
    }
}

/// Extract error information from a failed response.
pub(crate) async fn error_from_response(resp: reqwest::Response) -> GarminError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let body_snippet: String = body.chars().take(256).collect();
    GarminError::from_status(status, body_snippet)
}

#[async_trait]
impl GarminClient for ReqwestGarminClient {
    async fn get_daily_metric(
        &self,
        metric: DailyMetric,
        date: NaiveDate,
    ) -> Result<serde_json::Value, GarminError> {
        let (path, query) = self.daily_metric_request(metric, date);
        self.execute_json(self.get_request(&path).query(&query))
            .await
    }

    async fn get_body_battery(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, GarminError> {
        let qp = [("startDate", start.to_string()), ("endDate", end.to_string())];
        self.execute_json(
            self.get_request("/wellness-service/wellness/bodyBattery/reports/daily")
                .query(&qp),
        )
        .await
    }

    async fn get_activities(
        &self,
        start: u32,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, GarminError> {
        let qp = [("start", start.to_string()), ("limit", limit.to_string())];
        self.execute_json(
            self.get_request("/activitylist-service/activities/search/activities")
                .query(&qp),
        )
        .await
    }

    async fn get_activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<serde_json::Value>, GarminError> {
        let qp = [("startDate", start.to_string()), ("endDate", end.to_string())];
        self.execute_json(
            self.get_request("/activitylist-service/activities/search/activities")
                .query(&qp),
        )
        .await
    }

    async fn get_activity(&self, activity_id: u64) -> Result<serde_json::Value, GarminError> {
        let path = format!("/activity-service/activity/{}", activity_id);
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, GarminError> {
        let qp = [("startDate", start.to_string()), ("endDate", end.to_string())];
        self.execute_json(self.get_request("/weight-service/weight/dateRange").query(&qp))
            .await
    }

    async fn get_weigh_ins(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, GarminError> {
        let path = format!("/weight-service/weight/range/{}/{}", start, end);
        self.execute_json(self.get_request(&path).query(&[("includeAll", "true")]))
            .await
    }

    async fn get_weekly_steps(
        &self,
        end: NaiveDate,
        weeks: u32,
    ) -> Result<serde_json::Value, GarminError> {
        let path = format!("/usersummary-service/stats/steps/weekly/{}/{}", end, weeks);
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_weekly_stress(
        &self,
        end: NaiveDate,
        weeks: u32,
    ) -> Result<serde_json::Value, GarminError> {
        let path = format!("/usersummary-service/stats/stress/weekly/{}/{}", end, weeks);
        self.execute_json(self.get_request(&path)).await
    }

    async fn get_user_profile(&self) -> Result<serde_json::Value, GarminError> {
        self.execute_json(self.get_request("/userprofile-service/userprofile/user-settings"))
            .await
    }

    async fn get_devices(&self) -> Result<serde_json::Value, GarminError> {
        self.execute_json(self.get_request("/device-service/deviceregistration/devices"))
            .await
    }

    async fn get_personal_records(&self) -> Result<serde_json::Value, GarminError> {
        let path = format!(
            "/personalrecord-service/personalrecord/prs/{}",
            self.display_name
        );
        self.execute_json(self.get_request(&path)).await
    }
}
