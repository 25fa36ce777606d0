// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delegated advertiser credentials: the OAuth authorization flow, anti-CSRF
//! state, and proactive token refresh.

pub mod lifecycle;
pub mod oauth;
pub mod state;

pub use lifecycle::{
    AppCredentials, AuthorizationOutcome, RefreshOutcome, TokenLifecycle, REFRESH_THRESHOLD,
};
pub use oauth::TokenSet;
pub use state::{MemoryStateStore, OAuthStateManager, StatePayload, StateStore};
