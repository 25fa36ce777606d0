// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Anti-CSRF state tokens for the OAuth authorization flow.
//!
//! A token is issued when the authorization URL is built and must come back
//! exactly once on the callback before it expires.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::credential::oauth::generate_state;
use crate::error::StateError;
use crate::store::epoch_secs;

/// Key namespace for state entries.
pub const STATE_KEY_PREFIX: &str = "oauth:state:";

/// Default lifetime of an issued state.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Payload carried alongside a state token.
pub type StatePayload = BTreeMap<String, String>;

/// Ephemeral key-value storage with per-entry expiry.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn put(&self, key: &str, value: StatePayload, ttl: Duration) -> Result<(), StateError>;

    /// Remove and return an unexpired entry in one step.
    async fn take(&self, key: &str) -> Result<Option<StatePayload>, StateError>;
}

struct Entry {
    value: StatePayload,
    expires_at: Instant,
}

/// In-process [`StateStore`]. Expired entries are purged lazily on write.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(&self, key: &str, value: StatePayload, ttl: Duration) -> Result<(), StateError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| StateError::Store(format!("state ttl out of range: {ttl:?}")))?;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<StatePayload>, StateError> {
        let entry = self.entries.lock().await.remove(key);
        Ok(entry.filter(|e| e.expires_at > Instant::now()).map(|e| e.value))
    }
}

/// Issues and validates single-use state tokens.
pub struct OAuthStateManager {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl OAuthStateManager {
    pub fn new(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStateStore::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(token: &str) -> String {
        format!("{STATE_KEY_PREFIX}{token}")
    }

    /// Store `payload` under a fresh token and return the token.
    pub async fn generate_and_save(&self, mut payload: StatePayload) -> Result<String, StateError> {
        let token = generate_state();
        payload.insert("created_at".to_owned(), epoch_secs().to_string());
        self.store.put(&Self::key(&token), payload, self.ttl).await?;
        Ok(token)
    }

    /// Consume a token. Absent, expired, and replayed tokens all fail alike.
    pub async fn validate(&self, token: &str) -> Result<StatePayload, StateError> {
        if token.is_empty() {
            return Err(StateError::NotFound);
        }
        self.store.take(&Self::key(token)).await?.ok_or(StateError::NotFound)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
