// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for operator status endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, StoreError};
use crate::scheduler::JobStatus;
use crate::state::AppState;
use crate::store::{AdvertiserStatus, OperationLog};

const DEFAULT_OPERATION_LIMIT: i64 = 50;
const MAX_OPERATION_LIMIT: i64 = 500;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct AdvertisersResponse {
    pub advertisers: Vec<AdvertiserStatus>,
}

#[derive(Debug, Serialize)]
pub struct DeleteAdvertiserResponse {
    pub advertiser_id: i64,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Deserialize)]
pub struct OperationsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub operations: Vec<OperationLog>,
}

/// Log a store failure and answer with a generic 500.
pub(crate) fn internal(err: &StoreError) -> Response {
    tracing::error!(err = %err, "store operation failed");
    ErrorCode::Internal.to_http_response("internal error").into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

/// `GET /api/v1/advertisers`: stored advertisers, without tokens.
pub async fn list_advertisers(State(s): State<Arc<AppState>>) -> Response {
    match s.store.list_advertisers().await {
        Ok(rows) => Json(AdvertisersResponse {
            advertisers: rows.iter().map(|c| c.status()).collect(),
        })
        .into_response(),
        Err(e) => internal(&e),
    }
}

/// `DELETE /api/v1/advertisers/{id}`: soft delete.
pub async fn delete_advertiser(
    State(s): State<Arc<AppState>>,
    Path(advertiser_id): Path<i64>,
) -> Response {
    match s.store.soft_delete(advertiser_id).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return ErrorCode::NotFound.to_http_response("advertiser not found").into_response();
        }
        Err(e) => return internal(&e),
    }
    tracing::info!(advertiser_id, "advertiser deleted");
    if let Err(e) = s.store.record_operation("advertiser_delete", Some(advertiser_id), "").await {
        tracing::warn!(advertiser_id, err = %e, "failed to record operation");
    }
    Json(DeleteAdvertiserResponse { advertiser_id, deleted: true }).into_response()
}

/// `GET /api/v1/jobs`: scheduler status board.
pub async fn list_jobs(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(JobsResponse { jobs: s.jobs.snapshot().await })
}

/// `GET /api/v1/operations?limit=`: most recent operation log entries.
pub async fn list_operations(
    State(s): State<Arc<AppState>>,
    Query(q): Query<OperationsQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_OPERATION_LIMIT).clamp(1, MAX_OPERATION_LIMIT);
    match s.store.recent_operations(limit).await {
        Ok(operations) => Json(OperationsResponse { operations }).into_response(),
        Err(e) => internal(&e),
    }
}
