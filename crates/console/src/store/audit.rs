// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation log: an append-only trail of operator-visible actions.

use serde::Serialize;

use crate::error::StoreError;
use crate::store::{epoch_secs, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OperationLog {
    pub id: i64,
    pub action: String,
    pub advertiser_id: Option<i64>,
    pub detail: String,
    pub created_at: i64,
}

impl Store {
    pub async fn record_operation(
        &self,
        action: &str,
        advertiser_id: Option<i64>,
        detail: &str,
    ) -> Result<(), StoreError> {
        self.insert_operation_log(action, advertiser_id, detail, epoch_secs()).await
    }

    pub async fn insert_operation_log(
        &self,
        action: &str,
        advertiser_id: Option<i64>,
        detail: &str,
        created_at: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sys_operation_log (action, advertiser_id, detail, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(action)
        .bind(advertiser_id)
        .bind(detail)
        .bind(created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Most recent entries first.
    pub async fn recent_operations(&self, limit: i64) -> Result<Vec<OperationLog>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT id, action, advertiser_id, detail, created_at FROM sys_operation_log \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    /// Delete entries created before `cutoff`. Returns the number removed.
    pub async fn delete_operation_logs_before(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sys_operation_log WHERE created_at < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
