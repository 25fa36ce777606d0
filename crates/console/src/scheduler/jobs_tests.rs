// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::credential::oauth::REFRESH_TOKEN_PATH;
use crate::test_support::{seed_advertiser, test_config, Harness};
use crate::upstream::advertiser::{Wallet, DAILY_REPORT_PATH, WALLET_PATH};

fn far() -> Option<i64> {
    Some(epoch_secs() + 30 * 86_400)
}

fn row(cost: f64, show_cnt: i64) -> ReportRow {
    ReportRow {
        stat_datetime: "2026-10-14 00:00:00".into(),
        cost,
        show_cnt,
        click_cnt: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn balance_sync_isolates_failing_advertiser() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    for id in [1, 2, 3] {
        seed_advertiser(&h.store, id, &format!("access-{id}"), "r", far()).await?;
    }
    h.mock.fail_wallet(2).await;
    h.mock.set_wallet(3, Wallet { balance: 500, valid_balance: 400, cash_balance: 100 }).await;

    let counts = BalanceSyncJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 2, failure: 1 });

    let one = h.store.get_advertiser(1).await?.ok_or_else(|| anyhow::anyhow!("missing 1"))?;
    assert_eq!(one.balance, 1234.56);
    assert!(one.last_sync_at.is_some());

    let two = h.store.get_advertiser(2).await?.ok_or_else(|| anyhow::anyhow!("missing 2"))?;
    assert_eq!(two.balance, 0.0);
    assert_eq!(two.last_sync_at, None);

    let three = h.store.get_advertiser(3).await?.ok_or_else(|| anyhow::anyhow!("missing 3"))?;
    assert_eq!(three.balance, 5.0);
    assert_eq!(three.cash_balance, 1.0);

    // Each wallet request carries that advertiser's own token.
    let tokens: Vec<Option<String>> =
        h.mock.calls_to(WALLET_PATH).await.into_iter().map(|c| c.access_token).collect();
    assert_eq!(
        tokens,
        vec![Some("access-1".into()), Some("access-2".into()), Some("access-3".into())]
    );
    Ok(())
}

#[tokio::test]
async fn balance_sync_refreshes_near_expiry_first() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 4, "stale", "r4", Some(epoch_secs() + 30)).await?;

    let counts = BalanceSyncJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 1, failure: 0 });

    let call = h.mock.calls_to(WALLET_PATH).await.pop().ok_or_else(|| anyhow::anyhow!("no call"))?;
    assert_ne!(call.access_token.as_deref(), Some("stale"));
    assert_eq!(h.mock.calls_to(REFRESH_TOKEN_PATH).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn balance_sync_skips_unauthorized_and_deleted() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 1, "a", "r", far()).await?;
    seed_advertiser(&h.store, 2, "", "", None).await?;
    seed_advertiser(&h.store, 3, "c", "r", far()).await?;
    h.store.soft_delete(3).await?;

    let counts = BalanceSyncJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 1, failure: 0 });
    assert_eq!(h.mock.calls_to(WALLET_PATH).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_sweep_processes_nothing() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    for id in [1, 2] {
        seed_advertiser(&h.store, id, "a", "r", far()).await?;
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let counts = BalanceSyncJob::new(Arc::clone(&h.lifecycle)).run(&cancel).await?;
    assert_eq!(counts, RunCounts::default());
    assert!(h.mock.calls_to(WALLET_PATH).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn sweep_stops_after_cancel_mid_run() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    for id in [1, 2, 3] {
        seed_advertiser(&h.store, id, "a", "r", far()).await?;
    }
    let credentials = h.store.list_authorized().await?;
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    let counts = sweep("test", credentials, &cancel, |c| {
        seen.push(c.advertiser_id);
        cancel.cancel();
        async { Ok::<(), std::convert::Infallible>(()) }
    })
    .await;
    assert_eq!(counts, RunCounts { success: 1, failure: 0 });
    assert_eq!(seen, vec![1]);
    Ok(())
}

#[tokio::test]
async fn token_refresh_extends_expiring_credentials() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let soon = epoch_secs() + 60;
    seed_advertiser(&h.store, 1, "a1", "r1", Some(soon)).await?;
    seed_advertiser(&h.store, 2, "a2", "r2", far()).await?;
    seed_advertiser(&h.store, 3, "a3", "r3", None).await?;

    let counts = TokenRefreshJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 2, failure: 0 });

    let one = h.store.get_advertiser(1).await?.ok_or_else(|| anyhow::anyhow!("missing 1"))?;
    assert!(one.token_expire_at.unwrap_or_default() > soon);
    assert_ne!(one.refresh_token, "r1");

    let two = h.store.get_advertiser(2).await?.ok_or_else(|| anyhow::anyhow!("missing 2"))?;
    assert_eq!(two.refresh_token, "r2");

    let three = h.store.get_advertiser(3).await?.ok_or_else(|| anyhow::anyhow!("missing 3"))?;
    assert!(three.token_expire_at.is_some());
    Ok(())
}

#[tokio::test]
async fn token_refresh_counts_rejected_grant_as_failure() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 1, "a1", "dead", Some(0)).await?;
    seed_advertiser(&h.store, 2, "a2", "alive", Some(0)).await?;
    h.mock.reject_refresh("dead").await;

    let counts = TokenRefreshJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 1, failure: 1 });

    // The rejected credential is left untouched for an operator to re-authorize.
    let one = h.store.get_advertiser(1).await?.ok_or_else(|| anyhow::anyhow!("missing 1"))?;
    assert_eq!(one.access_token, "a1");
    assert_eq!(one.refresh_token, "dead");
    Ok(())
}

#[tokio::test]
async fn token_refresh_without_lifetime_is_failure_and_keeps_expiry() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let before = epoch_secs() + 1800;
    seed_advertiser(&h.store, 1, "a1", "r1", Some(before)).await?;
    h.mock.omit_refresh_lifetime("r1").await;

    let counts = TokenRefreshJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 0, failure: 1 });

    let one = h.store.get_advertiser(1).await?.ok_or_else(|| anyhow::anyhow!("missing 1"))?;
    assert_eq!(one.token_expire_at, Some(before));
    assert_eq!(one.access_token, "a1");
    assert_eq!(one.refresh_token, "r1");
    Ok(())
}

#[tokio::test]
async fn token_refresh_with_nothing_expiring_is_quiet() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 1, "a", "r", far()).await?;

    let counts = TokenRefreshJob::new(Arc::clone(&h.lifecycle)).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts::default());
    assert!(h.mock.calls_to(REFRESH_TOKEN_PATH).await.is_empty());
    Ok(())
}

#[test]
fn stat_date_is_previous_day() {
    let cases = [((2026, 10, 15), (2026, 10, 14)), ((2026, 3, 1), (2026, 2, 28)), ((2027, 1, 1), (2026, 12, 31))];
    for ((y, m, d), (ey, em, ed)) in cases {
        let today = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        assert_eq!(stat_date_for(today), NaiveDate::from_ymd_opt(ey, em, ed).unwrap_or_default());
    }
}

#[test]
fn fold_report_sums_rows() {
    let report = fold_report(5, "2026-10-14", &[row(1.5, 10), row(2.25, 5)]);
    assert_eq!(report.advertiser_id, 5);
    assert_eq!(report.stat_date, "2026-10-14");
    assert_eq!(report.cost, 3.75);
    assert_eq!(report.show_cnt, 15);
    assert_eq!(report.click_cnt, 2);
}

#[tokio::test]
async fn report_sync_writes_one_row_and_is_idempotent() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 1, "a", "r", far()).await?;
    seed_advertiser(&h.store, 2, "b", "r", far()).await?;
    h.mock.set_report(1, vec![row(10.0, 100), row(5.0, 50)]).await;

    let job = ReportSyncJob::new(Arc::clone(&h.lifecycle));
    let date = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default();
    let cancel = CancellationToken::new();

    let counts = job.sync_date(date, &cancel).await?;
    assert_eq!(counts, RunCounts { success: 2, failure: 0 });
    let counts = job.sync_date(date, &cancel).await?;
    assert_eq!(counts, RunCounts { success: 2, failure: 0 });

    let reports = h.store.list_daily_reports(1).await?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stat_date, "2026-10-14");
    assert_eq!(reports[0].cost, 15.0);
    assert_eq!(reports[0].show_cnt, 150);

    // No rows upstream means nothing written, but the sync is still stamped.
    assert!(h.store.list_daily_reports(2).await?.is_empty());
    let two = h.store.get_advertiser(2).await?.ok_or_else(|| anyhow::anyhow!("missing 2"))?;
    assert!(two.last_sync_at.is_some());

    let call = h.mock.calls_to(DAILY_REPORT_PATH).await.pop().ok_or_else(|| anyhow::anyhow!("no call"))?;
    assert_eq!(call.query.get("start_date").map(String::as_str), Some("2026-10-14"));
    assert_eq!(call.query.get("end_date").map(String::as_str), Some("2026-10-14"));
    Ok(())
}

#[tokio::test]
async fn report_rerun_overwrites_with_latest_figures() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 1, "a", "r", far()).await?;
    let job = ReportSyncJob::new(Arc::clone(&h.lifecycle));
    let date = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default();
    let cancel = CancellationToken::new();

    h.mock.set_report(1, vec![row(10.0, 100)]).await;
    job.sync_date(date, &cancel).await?;
    h.mock.set_report(1, vec![row(12.5, 120)]).await;
    job.sync_date(date, &cancel).await?;

    let reports = h.store.list_daily_reports(1).await?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].cost, 12.5);
    assert_eq!(reports[0].show_cnt, 120);
    Ok(())
}

#[tokio::test]
async fn log_retention_deletes_only_old_entries() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let now = epoch_secs();
    h.store.insert_operation_log("oauth_callback", Some(1), "old", now - 40 * 86_400).await?;
    h.store.insert_operation_log("oauth_callback", Some(1), "recent", now - 86_400).await?;

    let counts = LogRetentionJob::new(h.store.clone(), 30).run(&CancellationToken::new()).await?;
    assert_eq!(counts, RunCounts { success: 1, failure: 0 });

    let remaining = h.store.recent_operations(10).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].detail, "recent");
    Ok(())
}

#[tokio::test]
async fn standard_jobs_registers_all_four() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let config = test_config(h.mock.base_url());
    let scheduler = standard_jobs(&config, &h.lifecycle)?;
    assert_eq!(scheduler.len(), 4);
    Ok(())
}
