// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the console.

pub mod auth;
pub mod http;
pub mod http_oauth;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with all console routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Advertiser authorization (no auth, browser driven)
        .route("/api/v1/oauth/url", get(http_oauth::auth_url))
        .route("/api/v1/oauth/callback", get(http_oauth::callback))
        // Operator endpoints
        .route("/api/v1/oauth/refresh", post(http_oauth::refresh))
        .route("/api/v1/advertisers", get(http::list_advertisers))
        .route("/api/v1/advertisers/{id}", delete(http::delete_advertiser))
        .route("/api/v1/jobs", get(http::list_jobs))
        .route("/api/v1/operations", get(http::list_operations))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
