// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::config::ConsoleConfig;
use crate::credential::{AppCredentials, OAuthStateManager, TokenLifecycle};
use crate::scheduler::JobBoard;
use crate::store::Store;
use crate::upstream::PlatformClient;

/// Shared console state, handed to every HTTP handler.
pub struct AppState {
    pub config: ConsoleConfig,
    pub store: Store,
    pub lifecycle: Arc<TokenLifecycle>,
    pub states: OAuthStateManager,
    /// Status of the background jobs. Empty when the scheduler is disabled.
    pub jobs: JobBoard,
}

impl AppState {
    pub fn new(
        config: ConsoleConfig,
        store: Store,
        lifecycle: Arc<TokenLifecycle>,
        jobs: JobBoard,
    ) -> Self {
        let states = OAuthStateManager::in_memory(config.state_ttl());
        Self { config, store, lifecycle, states, jobs }
    }

    /// Wire a lifecycle and platform client from `config` around `store`.
    pub fn from_config(config: ConsoleConfig, store: Store, jobs: JobBoard) -> Self {
        let lifecycle = Arc::new(build_lifecycle(&config, store.clone()));
        Self::new(config, store, lifecycle, jobs)
    }
}

/// The one platform client and token lifecycle the process shares.
pub fn build_lifecycle(config: &ConsoleConfig, store: Store) -> TokenLifecycle {
    let client = Arc::new(PlatformClient::new(config.api_base_url.clone(), config.http_timeout()));
    TokenLifecycle::new(
        client,
        store,
        AppCredentials { app_id: config.app_id.clone(), secret: config.app_secret.clone() },
        config.refresh_retries,
    )
    .with_threshold(config.refresh_threshold())
}
