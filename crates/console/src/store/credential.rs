// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advertiser credential rows.

use serde::Serialize;

use crate::error::StoreError;
use crate::store::{epoch_secs, Store};
use crate::upstream::advertiser::{AdvertiserInfo, Balance};

const SELECT_COLUMNS: &str = "SELECT advertiser_id, name, company, role, status, access_token, \
     refresh_token, token_expire_at, balance, valid_balance, cash_balance, last_sync_at \
     FROM ad_advertiser";

/// One advertiser's stored credential and synced snapshot.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AdvertiserCredential {
    pub advertiser_id: i64,
    pub name: String,
    pub company: String,
    pub role: String,
    pub status: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expire_at: Option<i64>,
    pub balance: f64,
    pub valid_balance: f64,
    pub cash_balance: f64,
    pub last_sync_at: Option<i64>,
}

impl AdvertiserCredential {
    pub fn is_authorized(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// True when the token expiry is unknown or falls before `now + threshold_secs`.
    pub fn needs_refresh(&self, now: i64, threshold_secs: i64) -> bool {
        match self.token_expire_at {
            None => true,
            Some(expire_at) => expire_at < now + threshold_secs,
        }
    }

    /// Token-free view for operator listings.
    pub fn status(&self) -> AdvertiserStatus {
        AdvertiserStatus {
            advertiser_id: self.advertiser_id,
            name: self.name.clone(),
            company: self.company.clone(),
            authorized: self.is_authorized(),
            token_expire_at: self.token_expire_at,
            balance: self.balance,
            valid_balance: self.valid_balance,
            cash_balance: self.cash_balance,
            last_sync_at: self.last_sync_at,
        }
    }
}

/// Operator-facing advertiser summary. Never carries tokens.
#[derive(Debug, Clone, Serialize)]
pub struct AdvertiserStatus {
    pub advertiser_id: i64,
    pub name: String,
    pub company: String,
    pub authorized: bool,
    pub token_expire_at: Option<i64>,
    pub balance: f64,
    pub valid_balance: f64,
    pub cash_balance: f64,
    pub last_sync_at: Option<i64>,
}

/// The access/refresh/expiry triple, always written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expire_at: i64,
}

/// Metadata written alongside tokens on authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertiserMeta {
    pub name: String,
    pub company: String,
    pub role: String,
    pub status: String,
}

impl From<AdvertiserInfo> for AdvertiserMeta {
    fn from(info: AdvertiserInfo) -> Self {
        Self { name: info.name, company: info.company, role: info.role, status: info.status }
    }
}

impl Store {
    /// Advertisers holding an access token, in insertion order.
    pub async fn list_authorized(&self) -> Result<Vec<AdvertiserCredential>, StoreError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE access_token != '' AND deleted_at IS NULL ORDER BY id"
        );
        Ok(sqlx::query_as(&sql).fetch_all(self.pool()).await?)
    }

    /// Refreshable credentials whose expiry is unknown or before `before`.
    pub async fn list_expiring(&self, before: i64) -> Result<Vec<AdvertiserCredential>, StoreError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE refresh_token != '' AND deleted_at IS NULL \
             AND (token_expire_at IS NULL OR token_expire_at < ?) ORDER BY id"
        );
        Ok(sqlx::query_as(&sql).bind(before).fetch_all(self.pool()).await?)
    }

    pub async fn list_advertisers(&self) -> Result<Vec<AdvertiserCredential>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE deleted_at IS NULL ORDER BY id");
        Ok(sqlx::query_as(&sql).fetch_all(self.pool()).await?)
    }

    pub async fn get_advertiser(
        &self,
        advertiser_id: i64,
    ) -> Result<Option<AdvertiserCredential>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE advertiser_id = ? AND deleted_at IS NULL");
        Ok(sqlx::query_as(&sql).bind(advertiser_id).fetch_optional(self.pool()).await?)
    }

    /// Create or update an advertiser after authorization.
    ///
    /// Tokens are always replaced. Metadata fields are only replaced when
    /// non-empty, so a failed metadata fetch keeps the previous snapshot.
    /// Re-authorizing a soft-deleted advertiser restores it.
    pub async fn upsert_authorized(
        &self,
        advertiser_id: i64,
        meta: &AdvertiserMeta,
        tokens: &StoredTokens,
    ) -> Result<(), StoreError> {
        let now = epoch_secs();
        sqlx::query(
            "INSERT INTO ad_advertiser \
                (advertiser_id, name, company, role, status, access_token, refresh_token, \
                 token_expire_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (advertiser_id) DO UPDATE SET \
                name = COALESCE(NULLIF(excluded.name, ''), ad_advertiser.name), \
                company = COALESCE(NULLIF(excluded.company, ''), ad_advertiser.company), \
                role = COALESCE(NULLIF(excluded.role, ''), ad_advertiser.role), \
                status = COALESCE(NULLIF(excluded.status, ''), ad_advertiser.status), \
                access_token = excluded.access_token, \
                refresh_token = excluded.refresh_token, \
                token_expire_at = excluded.token_expire_at, \
                updated_at = excluded.updated_at, \
                deleted_at = NULL",
        )
        .bind(advertiser_id)
        .bind(&meta.name)
        .bind(&meta.company)
        .bind(&meta.role)
        .bind(&meta.status)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expire_at)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Replace the token triple of an existing advertiser.
    pub async fn update_tokens(
        &self,
        advertiser_id: i64,
        tokens: &StoredTokens,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE ad_advertiser SET access_token = ?, refresh_token = ?, token_expire_at = ?, \
             updated_at = ? WHERE advertiser_id = ? AND deleted_at IS NULL",
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expire_at)
        .bind(epoch_secs())
        .bind(advertiser_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(advertiser_id));
        }
        Ok(())
    }

    /// Overwrite the balance snapshot and stamp `last_sync_at`.
    pub async fn update_balance(
        &self,
        advertiser_id: i64,
        balance: &Balance,
        synced_at: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE ad_advertiser SET balance = ?, valid_balance = ?, cash_balance = ?, \
             last_sync_at = ?, updated_at = ? WHERE advertiser_id = ? AND deleted_at IS NULL",
        )
        .bind(balance.balance)
        .bind(balance.valid_balance)
        .bind(balance.cash_balance)
        .bind(synced_at)
        .bind(synced_at)
        .bind(advertiser_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(advertiser_id));
        }
        Ok(())
    }

    /// Stamp `last_sync_at` without touching other columns.
    pub async fn touch_synced(&self, advertiser_id: i64, synced_at: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE ad_advertiser SET last_sync_at = ?, updated_at = ? \
             WHERE advertiser_id = ? AND deleted_at IS NULL",
        )
        .bind(synced_at)
        .bind(synced_at)
        .bind(advertiser_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Soft-delete an advertiser. Its rows are skipped by every job.
    pub async fn soft_delete(&self, advertiser_id: i64) -> Result<(), StoreError> {
        let now = epoch_secs();
        let result = sqlx::query(
            "UPDATE ad_advertiser SET deleted_at = ?, updated_at = ? \
             WHERE advertiser_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(advertiser_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(advertiser_id));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
