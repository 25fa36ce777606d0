// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform business codes that signal throttling rather than a hard failure.
pub const RATE_LIMIT_CODES: &[i64] = &[40100, 40110];

/// Error codes for the console API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    NotFound,
    UpstreamError,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::UpstreamError => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Failure talking to the remote advertising platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Network failure, timeout, or a non-2xx HTTP status.
    #[error("transport error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    /// The platform answered with a non-zero business code.
    #[error("platform error {code}: {message} (request_id={request_id})")]
    Api { code: i64, message: String, request_id: String },

    /// A 2xx body that is not a valid envelope or does not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { code, .. } => RATE_LIMIT_CODES.contains(code),
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        Self::Transport { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
    }
}

/// CSRF state validation failure.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Absent, expired, or already consumed.
    #[error("state not found or expired")]
    NotFound,

    #[error("state store error: {0}")]
    Store(String),
}

/// Persistence layer failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("advertiser not found: {0}")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Token lifecycle failure.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    State(#[from] StateError),

    /// No refresh token on record; the advertiser must re-authorize.
    #[error("advertiser {0} has no refresh token; re-authorization required")]
    CredentialMissing(i64),

    /// The platform call succeeded but the result could not be stored.
    #[error("failed to persist credential: {0}")]
    Persistence(#[from] StoreError),
}

impl CredentialError {
    /// Map onto the API error code and a client-safe message.
    pub fn to_error_code(&self) -> (ErrorCode, &'static str) {
        match self {
            Self::Platform(_) => (ErrorCode::UpstreamError, "advertising platform request failed"),
            Self::State(StateError::NotFound) => {
                (ErrorCode::BadRequest, "invalid or expired authorization request")
            }
            Self::State(StateError::Store(_)) => (ErrorCode::Internal, "internal error"),
            Self::CredentialMissing(_) => (ErrorCode::NotFound, "advertiser is not authorized"),
            Self::Persistence(StoreError::NotFound(_)) => {
                (ErrorCode::NotFound, "advertiser is not authorized")
            }
            Self::Persistence(_) => (ErrorCode::Internal, "internal error"),
        }
    }
}
