// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth helper types and URL builders for the platform's authorization flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::store::StoredTokens;

pub const ACCESS_TOKEN_PATH: &str = "/oauth2/access_token/";
pub const REFRESH_TOKEN_PATH: &str = "/oauth2/refresh_token/";

/// Token grant returned by the access-token and refresh-token endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    /// Advertisers covered by this grant (authorization only).
    #[serde(default)]
    pub advertiser_ids: Vec<i64>,
}

impl TokenSet {
    /// Reject grants that would break the token-triple invariant.
    pub fn validate(self) -> Result<Self, PlatformError> {
        if self.access_token.is_empty() || self.refresh_token.is_empty() {
            return Err(PlatformError::Decode("token grant missing access or refresh token".into()));
        }
        if self.expires_in <= 0 {
            return Err(PlatformError::Decode(format!(
                "token grant has non-positive expires_in: {}",
                self.expires_in
            )));
        }
        Ok(self)
    }

    /// The triple to persist, with expiry anchored at `now`.
    pub fn stored_at(&self, now: i64) -> StoredTokens {
        StoredTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expire_at: now + self.expires_in,
        }
    }
}

/// Generate an opaque state token (32 random bytes, base64url).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// An unparseable configured or caller-supplied URL.
#[derive(Debug, thiserror::Error)]
#[error("invalid url: {0}")]
pub struct InvalidUrl(pub String);

/// Parameters for the advertiser-facing authorization page.
#[derive(Debug, Clone)]
pub struct AuthUrlParams<'a> {
    pub auth_url: &'a str,
    pub app_id: &'a str,
    pub state: &'a str,
    pub redirect_uri: Option<&'a str>,
    pub material_auth: bool,
}

/// Build the authorization URL advertisers are sent to.
pub fn build_auth_url(params: &AuthUrlParams<'_>) -> Result<String, InvalidUrl> {
    let mut url = Url::parse(params.auth_url).map_err(|e| InvalidUrl(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("app_id", params.app_id);
        query.append_pair("state", params.state);
        if let Some(redirect_uri) = params.redirect_uri {
            query.append_pair("redirect_uri", redirect_uri);
        }
        if params.material_auth {
            query.append_pair("material_auth", "1");
        }
    }
    Ok(url.into())
}

/// Append the success markers to the caller's return URL.
pub fn append_auth_result(
    return_url: &str,
    advertiser_count: usize,
) -> Result<String, InvalidUrl> {
    let mut url = Url::parse(return_url).map_err(|e| InvalidUrl(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("auth_result", "success")
        .append_pair("advertiser_count", &advertiser_count.to_string());
    Ok(url.into())
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
