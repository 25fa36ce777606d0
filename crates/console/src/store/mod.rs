// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage: advertiser credentials, daily reports, operation log.
//!
//! Backed by SQLite through a shared `sqlx` pool. Every write is scoped to
//! one advertiser row and to the columns its writer owns, so a balance sync
//! never clobbers a concurrent token refresh.

pub mod audit;
pub mod credential;
pub mod report;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::StoreError;

pub use audit::OperationLog;
pub use credential::{AdvertiserCredential, AdvertiserMeta, AdvertiserStatus, StoredTokens};
pub use report::DailyReport;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Current wall-clock time as epoch seconds.
pub fn epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Handle to the console database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database for tests and dry runs.
    ///
    /// Pinned to a single connection that never expires, since every new
    /// `:memory:` connection is a fresh empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
