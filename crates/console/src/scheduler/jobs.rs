// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The console's synchronization jobs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeDelta};
use tokio_util::sync::CancellationToken;

use crate::config::ConsoleConfig;
use crate::credential::TokenLifecycle;
use crate::scheduler::{Job, RunCounts, Schedule, Scheduler};
use crate::store::{epoch_secs, AdvertiserCredential, DailyReport, Store};
use crate::upstream::advertiser::{self, ReportRow};

/// Apply `f` to each credential in order, isolating failures per advertiser.
///
/// Stops before the next item once `cancel` fires; an item already in
/// flight is allowed to finish.
pub async fn sweep<F, Fut, E>(
    job: &str,
    credentials: Vec<AdvertiserCredential>,
    cancel: &CancellationToken,
    mut f: F,
) -> RunCounts
where
    F: FnMut(AdvertiserCredential) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    let mut counts = RunCounts::default();
    for credential in credentials {
        if cancel.is_cancelled() {
            tracing::info!(job, "cancelled, skipping remaining advertisers");
            break;
        }
        let advertiser_id = credential.advertiser_id;
        match f(credential).await {
            Ok(()) => counts.success += 1,
            Err(e) => {
                counts.failure += 1;
                tracing::warn!(job, advertiser_id, err = %e, "advertiser sync failed");
            }
        }
    }
    counts
}

/// Pull wallet balances for every authorized advertiser.
pub struct BalanceSyncJob {
    lifecycle: Arc<TokenLifecycle>,
}

impl BalanceSyncJob {
    pub fn new(lifecycle: Arc<TokenLifecycle>) -> Self {
        Self { lifecycle }
    }

    async fn sync_one(&self, credential: AdvertiserCredential) -> anyhow::Result<()> {
        let credential = self.lifecycle.ensure_fresh(credential).await?;
        let advertiser_id = credential.advertiser_id;
        let wallet =
            advertiser::get_wallet(self.lifecycle.client(), &credential.access_token, advertiser_id)
                .await?;
        self.lifecycle.store().update_balance(advertiser_id, &wallet.to_major(), epoch_secs()).await?;
        Ok(())
    }
}

#[async_trait]
impl Job for BalanceSyncJob {
    fn name(&self) -> &'static str {
        "balance_sync"
    }

    async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<RunCounts> {
        let credentials = self.lifecycle.store().list_authorized().await?;
        Ok(sweep(self.name(), credentials, cancel, |c| self.sync_one(c)).await)
    }
}

/// The statistics day a report sync started on `today` covers.
pub fn stat_date_for(today: NaiveDate) -> NaiveDate {
    today - TimeDelta::days(1)
}

/// Sum every row the platform returned for one day into a single record.
pub fn fold_report(advertiser_id: i64, stat_date: &str, rows: &[ReportRow]) -> DailyReport {
    rows.iter().fold(
        DailyReport { advertiser_id, stat_date: stat_date.to_owned(), ..Default::default() },
        |mut acc, row| {
            acc.cost += row.cost;
            acc.show_cnt += row.show_cnt;
            acc.click_cnt += row.click_cnt;
            acc.convert_cnt += row.convert_cnt;
            acc.pay_order_cnt += row.pay_order_cnt;
            acc.pay_order_amount += row.pay_order_amount;
            acc
        },
    )
}

/// Pull yesterday's advertiser report into `ad_report_daily`.
pub struct ReportSyncJob {
    lifecycle: Arc<TokenLifecycle>,
}

impl ReportSyncJob {
    pub fn new(lifecycle: Arc<TokenLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Sync one statistics day for every authorized advertiser. Idempotent.
    pub async fn sync_date(
        &self,
        stat_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunCounts> {
        let date = stat_date.format("%Y-%m-%d").to_string();
        tracing::info!(stat_date = %date, "syncing daily reports");
        let credentials = self.lifecycle.store().list_authorized().await?;
        Ok(sweep(self.name(), credentials, cancel, |c| self.sync_one(c, &date)).await)
    }

    async fn sync_one(&self, credential: AdvertiserCredential, date: &str) -> anyhow::Result<()> {
        let credential = self.lifecycle.ensure_fresh(credential).await?;
        let advertiser_id = credential.advertiser_id;
        let rows = advertiser::get_daily_report(
            self.lifecycle.client(),
            &credential.access_token,
            advertiser_id,
            date,
            date,
        )
        .await?;

        let store = self.lifecycle.store();
        if !rows.is_empty() {
            store.upsert_daily_report(&fold_report(advertiser_id, date, &rows)).await?;
        }
        store.touch_synced(advertiser_id, epoch_secs()).await?;
        Ok(())
    }
}

#[async_trait]
impl Job for ReportSyncJob {
    fn name(&self) -> &'static str {
        "report_sync"
    }

    async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<RunCounts> {
        self.sync_date(stat_date_for(Local::now().date_naive()), cancel).await
    }
}

/// Refresh credentials that are about to expire.
pub struct TokenRefreshJob {
    lifecycle: Arc<TokenLifecycle>,
}

impl TokenRefreshJob {
    pub fn new(lifecycle: Arc<TokenLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl Job for TokenRefreshJob {
    fn name(&self) -> &'static str {
        "token_refresh"
    }

    async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<RunCounts> {
        let before = epoch_secs() + self.lifecycle.threshold().as_secs() as i64;
        let credentials = self.lifecycle.store().list_expiring(before).await?;
        if credentials.is_empty() {
            return Ok(RunCounts::default());
        }
        tracing::info!(count = credentials.len(), "refreshing expiring tokens");
        Ok(sweep(self.name(), credentials, cancel, |c| async move {
            self.lifecycle.refresh_and_persist(c.advertiser_id, &c.refresh_token).await.map(drop)
        })
        .await)
    }
}

/// Trim the operation log.
pub struct LogRetentionJob {
    store: Store,
    retention: Duration,
}

impl LogRetentionJob {
    pub fn new(store: Store, retention_days: u32) -> Self {
        Self { store, retention: Duration::from_secs(u64::from(retention_days) * 86_400) }
    }
}

#[async_trait]
impl Job for LogRetentionJob {
    fn name(&self) -> &'static str {
        "log_retention"
    }

    async fn run(&self, _cancel: &CancellationToken) -> anyhow::Result<RunCounts> {
        let cutoff = epoch_secs() - self.retention.as_secs() as i64;
        let deleted = self.store.delete_operation_logs_before(cutoff).await?;
        tracing::info!(deleted, cutoff, "operation log trimmed");
        Ok(RunCounts { success: 1, failure: 0 })
    }
}

/// The standard job set, scheduled from configuration.
pub fn standard_jobs(
    config: &ConsoleConfig,
    lifecycle: &Arc<TokenLifecycle>,
) -> anyhow::Result<Scheduler> {
    Ok(Scheduler::new()
        .add(
            Schedule::Every(config.balance_sync_interval()),
            BalanceSyncJob::new(Arc::clone(lifecycle)),
        )
        .add(
            Schedule::DailyAt(config.report_sync_time()?),
            ReportSyncJob::new(Arc::clone(lifecycle)),
        )
        .add(
            Schedule::Every(config.token_sweep_interval()),
            TokenRefreshJob::new(Arc::clone(lifecycle)),
        )
        .add(
            Schedule::DailyAt(config.log_cleanup_time()?),
            LogRetentionJob::new(lifecycle.store().clone(), config.log_retention_days),
        ))
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
