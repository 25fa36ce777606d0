// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use crate::error::StoreError;
use crate::store::{epoch_secs, Store};

/// Aggregated daily metrics for one advertiser, keyed by `(advertiser_id, stat_date)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailyReport {
    pub advertiser_id: i64,
    /// `YYYY-MM-DD`.
    pub stat_date: String,
    pub cost: f64,
    pub show_cnt: i64,
    pub click_cnt: i64,
    pub convert_cnt: i64,
    pub pay_order_cnt: i64,
    pub pay_order_amount: f64,
}

impl Store {
    /// Insert or overwrite the report for `(advertiser_id, stat_date)`.
    pub async fn upsert_daily_report(&self, report: &DailyReport) -> Result<(), StoreError> {
        let now = epoch_secs();
        sqlx::query(
            "INSERT INTO ad_report_daily \
                (advertiser_id, stat_date, cost, show_cnt, click_cnt, convert_cnt, \
                 pay_order_cnt, pay_order_amount, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (advertiser_id, stat_date) DO UPDATE SET \
                cost = excluded.cost, \
                show_cnt = excluded.show_cnt, \
                click_cnt = excluded.click_cnt, \
                convert_cnt = excluded.convert_cnt, \
                pay_order_cnt = excluded.pay_order_cnt, \
                pay_order_amount = excluded.pay_order_amount, \
                updated_at = excluded.updated_at",
        )
        .bind(report.advertiser_id)
        .bind(&report.stat_date)
        .bind(report.cost)
        .bind(report.show_cnt)
        .bind(report.click_cnt)
        .bind(report.convert_cnt)
        .bind(report.pay_order_cnt)
        .bind(report.pay_order_amount)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_daily_reports(
        &self,
        advertiser_id: i64,
    ) -> Result<Vec<DailyReport>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT advertiser_id, stat_date, cost, show_cnt, click_cnt, convert_cnt, \
             pay_order_cnt, pay_order_amount FROM ad_report_daily \
             WHERE advertiser_id = ? ORDER BY stat_date",
        )
        .bind(advertiser_id)
        .fetch_all(self.pool())
        .await?)
    }
}
