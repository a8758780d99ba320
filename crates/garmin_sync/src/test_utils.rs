//! Shared test doubles for the remote client, authenticator and prompter.
#![cfg(test)]

use crate::config::SyncConfig;
use crate::session::{PresetCredentials, PromptError, Prompter};
use async_trait::async_trait;
use chrono::NaiveDate;
use garmin_connect_client::retry::RetryPolicy;
use garmin_connect_client::{
    Authenticator, DailyMetric, GarminClient, GarminError, LoginOutcome,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Config rooted in a temp dir: three-day history window and no delays.
pub fn test_config(dir: &Path) -> SyncConfig {
    let mut cfg = SyncConfig::new(dir.join("data"), dir.join("tokens"));
    cfg.history_days = 2;
    cfg.api_delay = Duration::ZERO;
    cfg.retry = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    };
    cfg
}

/// Activity summaries with the given ids.
pub fn activities(ids: std::ops::RangeInclusive<u64>) -> Vec<Value> {
    ids.map(|id| json!({"activityId": id, "activityName": format!("Run {id}")}))
        .collect()
}

pub fn preset(email: Option<&str>, password: Option<&str>) -> PresetCredentials {
    PresetCredentials {
        email: email.map(String::from),
        password: password.map(|p| SecretString::new(p.into())),
    }
}

fn server_error() -> GarminError {
    GarminError::Api {
        status: 500,
        body: "internal error".into(),
    }
}

/// In-memory Garmin Connect that records every call it receives.
#[derive(Debug, Default)]
pub struct FakeGarmin {
    calls: Mutex<Vec<String>>,
    pages: Vec<Vec<Value>>,
    range_activities: Vec<Value>,
    failing_details: HashSet<u64>,
    failing_metrics: HashSet<DailyMetric>,
    failing_profile: bool,
}

impl FakeGarmin {
    pub fn with_pages(mut self, pages: Vec<Vec<Value>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_range_activities(mut self, activities: Vec<Value>) -> Self {
        self.range_activities = activities;
        self
    }

    pub fn with_failing_detail(mut self, id: u64) -> Self {
        self.failing_details.insert(id);
        self
    }

    pub fn with_failing_metric(mut self, metric: DailyMetric) -> Self {
        self.failing_metrics.insert(metric);
        self
    }

    pub fn failing_profile(mut self) -> Self {
        self.failing_profile = true;
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls_with_prefix(prefix).len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl GarminClient for FakeGarmin {
    async fn get_daily_metric(
        &self,
        metric: DailyMetric,
        date: NaiveDate,
    ) -> Result<Value, GarminError> {
        self.record(format!("daily:{metric}:{date}"));
        if self.failing_metrics.contains(&metric) {
            return Err(server_error());
        }
        Ok(json!({"metric": metric.name(), "date": date.to_string()}))
    }

    async fn get_body_battery(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, GarminError> {
        self.record(format!("body_battery:{start}:{end}"));
        Ok(json!([{"date": start.to_string(), "charged": 50}]))
    }

    async fn get_activities(&self, start: u32, limit: u32) -> Result<Vec<Value>, GarminError> {
        self.record(format!("activities:{start}:{limit}"));
        let page = (start / limit.max(1)) as usize;
        Ok(self.pages.get(page).cloned().unwrap_or_default())
    }

    async fn get_activities_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Value>, GarminError> {
        self.record(format!("activities_by_date:{start}:{end}"));
        Ok(self.range_activities.clone())
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Value, GarminError> {
        self.record(format!("activity:{activity_id}"));
        if self.failing_details.contains(&activity_id) {
            return Err(server_error());
        }
        Ok(json!({"activityId": activity_id, "detail": true}))
    }

    async fn get_body_composition(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, GarminError> {
        self.record(format!("body_composition:{start}:{end}"));
        Ok(json!({"dateWeightList": []}))
    }

    async fn get_weigh_ins(&self, start: NaiveDate, end: NaiveDate) -> Result<Value, GarminError> {
        self.record(format!("weigh_ins:{start}:{end}"));
        Ok(json!({"dailyWeightSummaries": []}))
    }

    async fn get_weekly_steps(&self, end: NaiveDate, weeks: u32) -> Result<Value, GarminError> {
        self.record(format!("weekly_steps:{end}:{weeks}"));
        Ok(json!([]))
    }

    async fn get_weekly_stress(&self, end: NaiveDate, weeks: u32) -> Result<Value, GarminError> {
        self.record(format!("weekly_stress:{end}:{weeks}"));
        Ok(json!([]))
    }

    async fn get_user_profile(&self) -> Result<Value, GarminError> {
        self.record("user_profile".into());
        if self.failing_profile {
            return Err(server_error());
        }
        Ok(json!({"userName": "runner"}))
    }

    async fn get_devices(&self) -> Result<Value, GarminError> {
        self.record("devices".into());
        Ok(json!([{"deviceId": 1}]))
    }

    async fn get_personal_records(&self) -> Result<Value, GarminError> {
        self.record("personal_records".into());
        Ok(json!([]))
    }
}

/// What a scripted primary login answers.
pub enum LoginStep {
    Authenticated,
    NeedsMfa,
}

/// Authenticator that replays scripted answers and records what it was asked.
#[derive(Default)]
pub struct MockAuthenticator {
    restores: bool,
    fail_persist: bool,
    logins: Mutex<VecDeque<Result<LoginStep, GarminError>>>,
    resumes: Mutex<VecDeque<Result<(), GarminError>>>,
    seen_logins: Mutex<Vec<String>>,
    seen_codes: Mutex<Vec<String>>,
    persisted: AtomicUsize,
}

impl MockAuthenticator {
    pub fn restoring() -> Self {
        Self {
            restores: true,
            ..Self::default()
        }
    }

    pub fn with_logins(self, logins: Vec<Result<LoginStep, GarminError>>) -> Self {
        *self.logins.lock().unwrap() = logins.into();
        self
    }

    pub fn with_resumes(self, resumes: Vec<Result<(), GarminError>>) -> Self {
        *self.resumes.lock().unwrap() = resumes.into();
        self
    }

    pub fn failing_persist(mut self) -> Self {
        self.fail_persist = true;
        self
    }

    pub fn logins(&self) -> Vec<String> {
        self.seen_logins.lock().unwrap().clone()
    }

    pub fn codes(&self) -> Vec<String> {
        self.seen_codes.lock().unwrap().clone()
    }

    pub fn persisted(&self) -> usize {
        self.persisted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    type Client = FakeGarmin;
    type Challenge = ();

    async fn restore(&self, _token_dir: &Path) -> Result<FakeGarmin, GarminError> {
        if self.restores {
            Ok(FakeGarmin::default())
        } else {
            Err(GarminError::TokenStore("no tokens".into()))
        }
    }

    async fn login(
        &self,
        email: &str,
        _password: &SecretString,
    ) -> Result<LoginOutcome<FakeGarmin, ()>, GarminError> {
        self.seen_logins.lock().unwrap().push(email.to_string());
        let next = self.logins.lock().unwrap().pop_front();
        match next {
            Some(Ok(LoginStep::Authenticated)) => {
                Ok(LoginOutcome::Authenticated(FakeGarmin::default()))
            }
            Some(Ok(LoginStep::NeedsMfa)) => Ok(LoginOutcome::NeedsMfa(())),
            Some(Err(e)) => Err(e),
            None => Err(GarminError::Connection("login script exhausted".into())),
        }
    }

    async fn resume_login(&self, _challenge: (), code: &str) -> Result<FakeGarmin, GarminError> {
        self.seen_codes.lock().unwrap().push(code.to_string());
        let next = self.resumes.lock().unwrap().pop_front();
        match next {
            Some(Ok(())) => Ok(FakeGarmin::default()),
            Some(Err(e)) => Err(e),
            None => Err(GarminError::Connection("resume script exhausted".into())),
        }
    }

    async fn persist(&self, _client: &FakeGarmin, _token_dir: &Path) -> Result<(), GarminError> {
        if self.fail_persist {
            return Err(GarminError::TokenStore("read-only".into()));
        }
        self.persisted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Prompter that answers from queues and reports an interrupt once out of
/// emails or codes. Every password read answers "secret".
#[derive(Default)]
pub struct ScriptedPrompter {
    emails: Mutex<VecDeque<String>>,
    codes: Mutex<VecDeque<String>>,
    email_reads: AtomicUsize,
    password_reads: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn with_emails(self, emails: Vec<&str>) -> Self {
        *self.emails.lock().unwrap() = emails.into_iter().map(String::from).collect();
        self
    }

    pub fn with_codes(self, codes: Vec<&str>) -> Self {
        *self.codes.lock().unwrap() = codes.into_iter().map(String::from).collect();
        self
    }

    pub fn email_reads(&self) -> usize {
        self.email_reads.load(Ordering::SeqCst)
    }

    pub fn password_reads(&self) -> usize {
        self.password_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn read_email(&self) -> Result<String, PromptError> {
        self.email_reads.fetch_add(1, Ordering::SeqCst);
        let next = self.emails.lock().unwrap().pop_front();
        next.ok_or(PromptError::Interrupted)
    }

    async fn read_password(&self) -> Result<SecretString, PromptError> {
        self.password_reads.fetch_add(1, Ordering::SeqCst);
        Ok(SecretString::new("secret".into()))
    }

    async fn read_mfa_code(&self) -> Result<String, PromptError> {
        let next = self.codes.lock().unwrap().pop_front();
        next.ok_or(PromptError::Interrupted)
    }
}
