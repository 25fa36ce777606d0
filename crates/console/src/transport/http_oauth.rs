// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the advertiser authorization flow and operator refresh.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::DateTime;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::credential::oauth::{append_auth_result, build_auth_url, AuthUrlParams};
use crate::credential::{AuthorizationOutcome, StatePayload};
use crate::error::{CredentialError, ErrorCode};
use crate::state::AppState;

/// State payload key carrying the caller's return URL.
const REDIRECT_URL_KEY: &str = "redirect_url";

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub auth_code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub advertiser_ids: Vec<i64>,
    pub advertiser_count: usize,
    pub stored_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub advertiser_id: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub advertiser_id: i64,
    pub expires_in: i64,
    /// RFC 3339.
    pub expire_at: String,
}

/// Log a lifecycle failure in full and answer with its client-safe form.
fn credential_error(err: &CredentialError) -> Response {
    let (code, message) = err.to_error_code();
    if code == ErrorCode::Internal {
        tracing::error!(err = %err, "credential operation failed");
    } else {
        tracing::warn!(err = %err, "credential operation rejected");
    }
    code.to_http_response(message).into_response()
}

fn bad_request(message: &str) -> Response {
    ErrorCode::BadRequest.to_http_response(message).into_response()
}

/// `GET /api/v1/oauth/url`: issue a state token and the authorization URL.
pub async fn auth_url(
    State(s): State<Arc<AppState>>,
    Query(q): Query<AuthUrlQuery>,
) -> Response {
    let mut payload = StatePayload::new();
    if let Some(redirect_url) = q.redirect_url.filter(|u| !u.is_empty()) {
        if Url::parse(&redirect_url).is_err() {
            return bad_request("invalid redirect_url");
        }
        payload.insert(REDIRECT_URL_KEY.to_owned(), redirect_url);
    }

    let state = match s.states.generate_and_save(payload).await {
        Ok(state) => state,
        Err(e) => return credential_error(&e.into()),
    };

    let params = AuthUrlParams {
        auth_url: &s.config.auth_url,
        app_id: &s.config.app_id,
        state: &state,
        redirect_uri: s.config.redirect_uri.as_deref(),
        material_auth: s.config.material_auth,
    };
    match build_auth_url(&params) {
        Ok(auth_url) => Json(AuthUrlResponse { auth_url, state }).into_response(),
        Err(e) => {
            tracing::error!(err = %e, "configured authorization url is invalid");
            ErrorCode::Internal.to_http_response("internal error").into_response()
        }
    }
}

/// `GET /api/v1/oauth/callback`: the platform redirects the advertiser here.
pub async fn callback(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let (Some(auth_code), Some(state)) = (
        q.auth_code.filter(|c| !c.is_empty()),
        q.state.filter(|c| !c.is_empty()),
    ) else {
        return bad_request("missing auth_code or state");
    };

    let payload = match s.states.validate(&state).await {
        Ok(payload) => payload,
        Err(e) => return credential_error(&e.into()),
    };

    let outcome = match s.lifecycle.authorize(&auth_code).await {
        Ok(outcome) => outcome,
        Err(e) => return credential_error(&e),
    };
    record_authorization(&s, &outcome).await;

    if let Some(return_url) = payload.get(REDIRECT_URL_KEY) {
        match append_auth_result(return_url, outcome.advertiser_ids.len()) {
            Ok(location) => {
                return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
            }
            Err(e) => tracing::warn!(err = %e, "stored redirect url is invalid, answering with json"),
        }
    }

    Json(CallbackResponse {
        advertiser_count: outcome.advertiser_ids.len(),
        stored_count: outcome.stored.len(),
        advertiser_ids: outcome.advertiser_ids,
    })
    .into_response()
}

async fn record_authorization(s: &AppState, outcome: &AuthorizationOutcome) {
    for &advertiser_id in &outcome.stored {
        if let Err(e) = s.store.record_operation("oauth_authorize", Some(advertiser_id), "").await {
            tracing::warn!(advertiser_id, err = %e, "failed to record operation");
        }
    }
    if !outcome.failed.is_empty() {
        let detail = format!("failed to store advertisers {:?}", outcome.failed);
        if let Err(e) = s.store.record_operation("oauth_authorize", None, &detail).await {
            tracing::warn!(err = %e, "failed to record operation");
        }
    }
}

/// `POST /api/v1/oauth/refresh`: operator-triggered refresh.
pub async fn refresh(
    State(s): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Response {
    let advertiser_id = req.advertiser_id;
    let outcome = match s.lifecycle.refresh_advertiser(advertiser_id, req.refresh_token.as_deref()).await
    {
        Ok(outcome) => outcome,
        Err(e) => return credential_error(&e),
    };

    if let Err(e) = s.store.record_operation("token_refresh", Some(advertiser_id), "manual").await {
        tracing::warn!(advertiser_id, err = %e, "failed to record operation");
    }

    let expire_at = DateTime::from_timestamp(outcome.expire_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    Json(RefreshResponse { advertiser_id, expires_in: outcome.expires_in, expire_at })
        .into_response()
}
