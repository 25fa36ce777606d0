// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token acquisition, refresh, and persistence.
//!
//! Every grant the platform hands back is written to the store before it is
//! returned to a caller. A grant that cannot be stored is reported as
//! [`CredentialError::Persistence`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::credential::oauth::{TokenSet, ACCESS_TOKEN_PATH, REFRESH_TOKEN_PATH};
use crate::error::{CredentialError, PlatformError};
use crate::store::{epoch_secs, AdvertiserCredential, AdvertiserMeta, Store, StoredTokens};
use crate::upstream::advertiser;
use crate::upstream::PlatformClient;

/// Refresh credentials expiring within this window.
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(3600);

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// The console's own application identity on the platform.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub secret: String,
}

/// Result of a completed authorization callback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorizationOutcome {
    /// Every advertiser the grant covers.
    pub advertiser_ids: Vec<i64>,
    /// Advertisers whose credential was stored.
    pub stored: Vec<i64>,
    /// Advertisers whose credential could not be stored.
    pub failed: Vec<i64>,
}

/// Result of a refresh that was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub advertiser_id: i64,
    pub expires_in: i64,
    pub expire_at: i64,
}

pub struct TokenLifecycle {
    client: Arc<PlatformClient>,
    store: Store,
    app: AppCredentials,
    max_retries: u32,
    initial_backoff: Duration,
    threshold: Duration,
    /// Cuts refresh backoff short once the process is stopping.
    shutdown: CancellationToken,
}

impl TokenLifecycle {
    pub fn new(
        client: Arc<PlatformClient>,
        store: Store,
        app: AppCredentials,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            store,
            app,
            max_retries,
            initial_backoff: INITIAL_BACKOFF,
            threshold: REFRESH_THRESHOLD,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn client(&self) -> &Arc<PlatformClient> {
        &self.client
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Exchange an authorization code for a token grant.
    pub async fn exchange(&self, auth_code: &str) -> Result<TokenSet, CredentialError> {
        let body = json!({
            "app_id": self.app.app_id,
            "secret": self.app.secret,
            "grant_type": "auth_code",
            "auth_code": auth_code,
        });
        let grant: TokenSet = self.client.post(ACCESS_TOKEN_PATH, None, &body).await?;
        Ok(grant.validate()?)
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenSet, PlatformError> {
        let body = json!({
            "app_id": self.app.app_id,
            "secret": self.app.secret,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        let grant: TokenSet = self.client.post(REFRESH_TOKEN_PATH, None, &body).await?;
        grant.validate()
    }

    /// Renew a grant, backing off between retryable failures.
    ///
    /// Stops retrying at shutdown and returns the last failure.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, CredentialError> {
        let mut backoff = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            match self.request_refresh(refresh_token).await {
                Ok(grant) => return Ok(grant),
                Err(e) => {
                    if attempt == self.max_retries || !e.is_retryable() {
                        return Err(e.into());
                    }
                    tracing::debug!(attempt, err = %e, "refresh attempt failed, retrying");
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => {
                            tracing::debug!(attempt, "shutting down, abandoning refresh retries");
                            return Err(e.into());
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        Err(PlatformError::Transport { status: None, message: "refresh exhausted all retries".into() }
            .into())
    }

    async fn refresh_stored(
        &self,
        advertiser_id: i64,
        refresh_token: &str,
    ) -> Result<(TokenSet, StoredTokens), CredentialError> {
        if refresh_token.is_empty() {
            return Err(CredentialError::CredentialMissing(advertiser_id));
        }
        let grant = self.refresh(refresh_token).await?;
        let stored = grant.stored_at(epoch_secs());
        if let Err(e) = self.store.update_tokens(advertiser_id, &stored).await {
            tracing::error!(
                advertiser_id,
                err = %e,
                "refreshed token could not be stored; advertiser may need re-authorization"
            );
            return Err(e.into());
        }
        tracing::info!(advertiser_id, expire_at = stored.expire_at, "token refreshed");
        Ok((grant, stored))
    }

    /// Refresh one advertiser's credential and store the new triple.
    pub async fn refresh_and_persist(
        &self,
        advertiser_id: i64,
        refresh_token: &str,
    ) -> Result<RefreshOutcome, CredentialError> {
        let (grant, stored) = self.refresh_stored(advertiser_id, refresh_token).await?;
        Ok(RefreshOutcome { advertiser_id, expires_in: grant.expires_in, expire_at: stored.expire_at })
    }

    /// Operator-triggered refresh. Falls back to the stored refresh token.
    pub async fn refresh_advertiser(
        &self,
        advertiser_id: i64,
        refresh_token: Option<&str>,
    ) -> Result<RefreshOutcome, CredentialError> {
        let refresh_token = match refresh_token.filter(|t| !t.is_empty()) {
            Some(token) => token.to_owned(),
            None => self
                .store
                .get_advertiser(advertiser_id)
                .await?
                .map(|c| c.refresh_token)
                .ok_or(CredentialError::CredentialMissing(advertiser_id))?,
        };
        self.refresh_and_persist(advertiser_id, &refresh_token).await
    }

    /// Return a credential whose access token outlives the refresh threshold.
    pub async fn ensure_fresh(
        &self,
        credential: AdvertiserCredential,
    ) -> Result<AdvertiserCredential, CredentialError> {
        let threshold = self.threshold.as_secs() as i64;
        if !credential.needs_refresh(epoch_secs(), threshold) {
            return Ok(credential);
        }
        let (_, stored) =
            self.refresh_stored(credential.advertiser_id, &credential.refresh_token).await?;
        Ok(AdvertiserCredential {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            token_expire_at: Some(stored.expire_at),
            ..credential
        })
    }

    /// Complete an authorization: exchange the code and store a credential
    /// for every advertiser the grant covers.
    pub async fn authorize(&self, auth_code: &str) -> Result<AuthorizationOutcome, CredentialError> {
        let grant = self.exchange(auth_code).await?;
        let stored_tokens = grant.stored_at(epoch_secs());
        let mut outcome =
            AuthorizationOutcome { advertiser_ids: grant.advertiser_ids.clone(), ..Default::default() };

        for &advertiser_id in &grant.advertiser_ids {
            let meta = match advertiser::get_info(&self.client, &grant.access_token, advertiser_id)
                .await
            {
                Ok(Some(info)) => AdvertiserMeta::from(info),
                Ok(None) => AdvertiserMeta::default(),
                Err(e) => {
                    tracing::warn!(advertiser_id, err = %e, "advertiser info fetch failed, storing tokens only");
                    AdvertiserMeta::default()
                }
            };

            match self.store.upsert_authorized(advertiser_id, &meta, &stored_tokens).await {
                Ok(()) => outcome.stored.push(advertiser_id),
                Err(e) => {
                    tracing::error!(advertiser_id, err = %e, "failed to store authorized credential");
                    outcome.failed.push(advertiser_id);
                }
            }
        }

        tracing::info!(
            advertisers = outcome.advertiser_ids.len(),
            stored = outcome.stored.len(),
            failed = outcome.failed.len(),
            "authorization completed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
