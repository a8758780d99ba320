//! The sync run: daily metrics, activities, then the always-refreshed groups.

use crate::cache::FileCache;
use crate::config::SyncConfig;
use crate::state::SyncStateStore;
use crate::SyncResult;
use chrono::{Duration, NaiveDate};
use garmin_connect_client::{DailyMetric, GarminClient, GarminError, activity_id};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

const BODY_BATTERY: &str = "body_battery";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// No previous run: pull the whole history window and every activity.
    Initial,
    /// Continue from the last completed run.
    Incremental,
}

/// Mode and inclusive date range of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPlan {
    pub mode: SyncMode,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncPlan {
    pub fn determine(last_sync: Option<NaiveDate>, today: NaiveDate, history_days: i64) -> Self {
        match last_sync {
            Some(last) => Self {
                mode: SyncMode::Incremental,
                start: last,
                end: today,
            },
            None => Self {
                mode: SyncMode::Initial,
                start: today - Duration::days(history_days),
                end: today,
            },
        }
    }

    /// Every date in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn day_count(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }
}

/// Counters describing what a run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub plan: SyncPlan,
    /// Documents written, including unconditional refreshes.
    pub written: usize,
    /// Documents left alone because they were already cached.
    pub skipped: usize,
    /// Activities seen in list responses.
    pub activities: usize,
    /// Remote calls that produced nothing.
    pub missing: usize,
}

impl SyncReport {
    fn new(plan: SyncPlan) -> Self {
        Self {
            plan,
            written: 0,
            skipped: 0,
            activities: 0,
            missing: 0,
        }
    }
}

enum ActivityStatus {
    Cached,
    Fetched(u64),
}

pub struct Orchestrator {
    client: Arc<dyn GarminClient>,
    config: SyncConfig,
    cache: FileCache,
    state: SyncStateStore,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn GarminClient>, config: SyncConfig) -> Self {
        let cache = FileCache::new(&config.base_dir);
        let state = SyncStateStore::new(config.state_file());
        Self {
            client,
            config,
            cache,
            state,
        }
    }

    /// Run every sync step for the range ending at `today`, then record `today`.
    pub async fn run(&self, today: NaiveDate) -> SyncResult<SyncReport> {
        let last_sync = self.state.load().await?;
        let plan = SyncPlan::determine(last_sync, today, self.config.history_days);
        match plan.mode {
            SyncMode::Incremental => {
                println!("Incremental sync from {} to {}", plan.start, plan.end)
            }
            SyncMode::Initial => println!(
                "Initial sync: {} to {} ({} days)",
                plan.start, plan.end, self.config.history_days
            ),
        }
        tracing::info!(mode = ?plan.mode, start = %plan.start, end = %plan.end, "sync started");

        let mut report = SyncReport::new(plan);

        self.sync_daily(&plan, &mut report).await?;
        self.pause().await;

        match plan.mode {
            SyncMode::Initial => self.sync_activities_full(&mut report).await?,
            SyncMode::Incremental => {
                self.sync_activities_incremental(&plan, &mut report)
                    .await?
            }
        }
        self.pause().await;

        self.sync_body_composition(&plan, &mut report).await?;
        self.pause().await;

        self.sync_weekly(today, &mut report).await?;
        self.pause().await;

        self.sync_profile(&mut report).await?;
        self.pause().await;

        self.sync_personal_records(&mut report).await?;

        self.state.save(today).await?;
        tracing::info!(
            written = report.written,
            skipped = report.skipped,
            missing = report.missing,
            "sync finished"
        );
        println!(
            "\nSync complete. Data stored in {}",
            self.cache.base_dir().display()
        );
        Ok(report)
    }

    async fn pause(&self) {
        if !self.config.api_delay.is_zero() {
            tokio::time::sleep(self.config.api_delay).await;
        }
    }

    /// Call with retry; `None` means the document is simply missing this run.
    async fn fetch<T, F, Fut>(&self, report: &mut SyncReport, label: &str, f: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, GarminError>>,
    {
        let result = self.config.retry.call(label, f).await.into_option();
        if result.is_none() {
            report.missing += 1;
        }
        result
    }

    async fn store(&self, report: &mut SyncReport, path: &Path, value: &Value) -> SyncResult<()> {
        self.cache.write(path, value).await?;
        report.written += 1;
        metrics::counter!("garmin_sync_documents_written_total").increment(1);
        Ok(())
    }

    async fn sync_daily(&self, plan: &SyncPlan, report: &mut SyncReport) -> SyncResult<()> {
        let total = plan.day_count();
        for (i, date) in plan.days().enumerate() {
            println!("Syncing daily data: {}... {}/{}", date, i + 1, total);

            for metric in DailyMetric::ALL {
                let path = self.cache.daily_path(date, metric.name());
                if self.cache.exists(&path) {
                    report.skipped += 1;
                    continue;
                }
                let client = &self.client;
                let data = self
                    .fetch(report, metric.name(), || client.get_daily_metric(metric, date))
                    .await;
                if let Some(data) = data {
                    self.store(report, &path, &data).await?;
                }
                self.pause().await;
            }

            // Body battery is keyed by a (start, end) pair rather than one date.
            let path = self.cache.daily_path(date, BODY_BATTERY);
            if self.cache.exists(&path) {
                report.skipped += 1;
                continue;
            }
            let client = &self.client;
            let data = self
                .fetch(report, BODY_BATTERY, || client.get_body_battery(date, date))
                .await;
            if let Some(data) = data {
                self.store(report, &path, &data).await?;
            }
            self.pause().await;
        }
        Ok(())
    }

    /// Cache one activity by id: detail when available, the summary otherwise.
    ///
    /// A summary written after a failed detail fetch is never upgraded later.
    async fn sync_activity(
        &self,
        activity: &Value,
        report: &mut SyncReport,
    ) -> SyncResult<Option<ActivityStatus>> {
        let Some(id) = activity_id(activity) else {
            tracing::debug!("activity without id skipped");
            return Ok(None);
        };
        report.activities += 1;

        let path = self.cache.activity_path(id);
        if self.cache.exists(&path) {
            report.skipped += 1;
            return Ok(Some(ActivityStatus::Cached));
        }

        let client = &self.client;
        match self.fetch(report, "activity", || client.get_activity(id)).await {
            Some(detail) => self.store(report, &path, &detail).await?,
            None => {
                tracing::warn!(activity_id = id, "detail unavailable, caching summary");
                self.store(report, &path, activity).await?
            }
        }
        self.pause().await;
        Ok(Some(ActivityStatus::Fetched(id)))
    }

    async fn sync_activities_full(&self, report: &mut SyncReport) -> SyncResult<()> {
        println!("Syncing all activities (paginated)...");
        let limit = self.config.batch_size.max(1);
        let mut start = 0u32;
        let mut total = 0usize;

        loop {
            let client = &self.client;
            let batch = self
                .fetch(report, "activities", || client.get_activities(start, limit))
                .await
                .unwrap_or_default();
            if batch.is_empty() {
                break;
            }
            for activity in &batch {
                match self.sync_activity(activity, report).await? {
                    Some(ActivityStatus::Cached) => total += 1,
                    Some(ActivityStatus::Fetched(id)) => {
                        total += 1;
                        println!("  Activity {} ({})", id, total);
                    }
                    None => {}
                }
            }
            if batch.len() < limit as usize {
                break;
            }
            start += limit;
            self.pause().await;
        }

        println!("  {} activities synced.", total);
        Ok(())
    }

    async fn sync_activities_incremental(
        &self,
        plan: &SyncPlan,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        println!("Syncing activities from {} to {}...", plan.start, plan.end);
        let client = &self.client;
        let (start, end) = (plan.start, plan.end);
        let activities = self
            .fetch(report, "activities_by_date", || {
                client.get_activities_by_date(start, end)
            })
            .await
            .unwrap_or_default();
        if activities.is_empty() {
            println!("  No new activities.");
            return Ok(());
        }

        for activity in &activities {
            if let Some(ActivityStatus::Fetched(id)) = self.sync_activity(activity, report).await? {
                println!("  Activity {}", id);
            }
        }
        Ok(())
    }

    async fn sync_body_composition(
        &self,
        plan: &SyncPlan,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        println!("Syncing body composition...");
        let client = &self.client;
        let (start, end) = (plan.start, plan.end);

        let data = self
            .fetch(report, "body_composition", || {
                client.get_body_composition(start, end)
            })
            .await;
        if let Some(data) = data {
            let path = self.cache.document_path(Some("body_composition"), "body_comp");
            self.store(report, &path, &data).await?;
        }
        self.pause().await;

        let data = self
            .fetch(report, "weigh_ins", || client.get_weigh_ins(start, end))
            .await;
        if let Some(data) = data {
            let path = self.cache.document_path(Some("body_composition"), "weigh_ins");
            self.store(report, &path, &data).await?;
        }
        Ok(())
    }

    async fn sync_weekly(&self, today: NaiveDate, report: &mut SyncReport) -> SyncResult<()> {
        println!("Syncing weekly trends...");
        let client = &self.client;
        let weeks = self.config.weekly_weeks;

        let data = self
            .fetch(report, "weekly_steps", || client.get_weekly_steps(today, weeks))
            .await;
        if let Some(data) = data {
            let path = self.cache.document_path(Some("weekly"), "steps");
            self.store(report, &path, &data).await?;
        }
        self.pause().await;

        let data = self
            .fetch(report, "weekly_stress", || client.get_weekly_stress(today, weeks))
            .await;
        if let Some(data) = data {
            let path = self.cache.document_path(Some("weekly"), "stress");
            self.store(report, &path, &data).await?;
        }
        Ok(())
    }

    async fn sync_profile(&self, report: &mut SyncReport) -> SyncResult<()> {
        println!("Syncing profile...");
        let client = &self.client;

        let data = self
            .fetch(report, "user_profile", || client.get_user_profile())
            .await;
        if let Some(data) = data {
            let path = self.cache.document_path(Some("profile"), "user_profile");
            self.store(report, &path, &data).await?;
        }
        self.pause().await;

        let data = self.fetch(report, "devices", || client.get_devices()).await;
        if let Some(data) = data {
            let path = self.cache.document_path(Some("profile"), "devices");
            self.store(report, &path, &data).await?;
        }
        Ok(())
    }

    async fn sync_personal_records(&self, report: &mut SyncReport) -> SyncResult<()> {
        println!("Syncing personal records...");
        let client = &self.client;
        let data = self
            .fetch(report, "personal_records", || client.get_personal_records())
            .await;
        if let Some(data) = data {
            let path = self.cache.document_path(None, "personal_records");
            self.store(report, &path, &data).await?;
        }
        Ok(())
    }
}
