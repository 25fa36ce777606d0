// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::StoreError;
use crate::test_support::{
    advertiser_info, seed_advertiser, Harness, MOCK_EXPIRES_IN, VALID_AUTH_CODE,
};

#[tokio::test]
async fn exchange_sends_app_credentials() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    h.mock.grant_advertisers(vec![advertiser_info(1, "Shop")]).await;

    let grant = h.lifecycle.exchange(VALID_AUTH_CODE).await?;
    assert_eq!(grant.advertiser_ids, vec![1]);
    assert_eq!(grant.expires_in, MOCK_EXPIRES_IN);

    let calls = h.mock.calls_to(ACCESS_TOKEN_PATH).await;
    let call = &calls[0];
    assert_eq!(call.body["app_id"], "test-app");
    assert_eq!(call.body["secret"], "test-secret");
    assert_eq!(call.body["grant_type"], "auth_code");
    Ok(())
}

#[tokio::test]
async fn exchange_rejected_code_is_api_error() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let result = h.lifecycle.exchange("bogus").await;
    assert!(
        matches!(result, Err(CredentialError::Platform(PlatformError::Api { code: 40103, .. }))),
        "{result:?}"
    );
    Ok(())
}

#[tokio::test]
async fn authorize_stores_every_advertiser() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    h.mock.grant_advertisers(vec![advertiser_info(10, "A"), advertiser_info(20, "B")]).await;

    let outcome = h.lifecycle.authorize(VALID_AUTH_CODE).await?;
    assert_eq!(outcome.advertiser_ids, vec![10, 20]);
    assert_eq!(outcome.stored, vec![10, 20]);
    assert!(outcome.failed.is_empty());

    let row = h.store.get_advertiser(20).await?.ok_or_else(|| anyhow::anyhow!("missing 20"))?;
    assert_eq!(row.name, "B");
    assert_eq!(row.company, "B Co.");
    assert!(row.is_authorized());
    assert!(!row.refresh_token.is_empty());
    assert!(row.token_expire_at.is_some());
    Ok(())
}

#[tokio::test]
async fn authorize_keeps_tokens_when_metadata_fails() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    h.mock.grant_advertisers(vec![advertiser_info(5, "Five")]).await;
    h.mock.fail_info(true);

    let outcome = h.lifecycle.authorize(VALID_AUTH_CODE).await?;
    assert_eq!(outcome.stored, vec![5]);
    let row = h.store.get_advertiser(5).await?.ok_or_else(|| anyhow::anyhow!("missing 5"))?;
    assert!(row.is_authorized());
    assert_eq!(row.name, "");
    Ok(())
}

#[tokio::test]
async fn refresh_and_persist_extends_expiry() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let before = epoch_secs() + 60;
    seed_advertiser(&h.store, 3, "old-access", "old-refresh", Some(before)).await?;

    let outcome = h.lifecycle.refresh_and_persist(3, "old-refresh").await?;
    assert!(outcome.expire_at > before);
    assert_eq!(outcome.expires_in, MOCK_EXPIRES_IN);

    let row = h.store.get_advertiser(3).await?.ok_or_else(|| anyhow::anyhow!("missing 3"))?;
    assert_ne!(row.access_token, "old-access");
    assert_ne!(row.refresh_token, "old-refresh");
    assert_eq!(row.token_expire_at, Some(outcome.expire_at));
    Ok(())
}

#[tokio::test]
async fn refresh_for_unknown_advertiser_is_persistence_error() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let result = h.lifecycle.refresh_and_persist(999, "some-refresh").await;
    assert!(
        matches!(result, Err(CredentialError::Persistence(StoreError::NotFound(999)))),
        "{result:?}"
    );
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_is_not_retried() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 4, "a", "dead-refresh", Some(0)).await?;
    h.mock.reject_refresh("dead-refresh").await;

    let lifecycle = TokenLifecycle::new(
        Arc::clone(&h.client),
        h.store.clone(),
        AppCredentials { app_id: "test-app".into(), secret: "test-secret".into() },
        3,
    );
    let result = lifecycle.refresh_and_persist(4, "dead-refresh").await;
    assert!(matches!(result, Err(CredentialError::Platform(_))), "{result:?}");
    assert_eq!(h.mock.calls_to(REFRESH_TOKEN_PATH).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn rate_limited_refresh_is_retried() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    h.mock.rate_limit_refreshes(2);

    let lifecycle = TokenLifecycle::new(
        Arc::clone(&h.client),
        h.store.clone(),
        AppCredentials { app_id: "test-app".into(), secret: "test-secret".into() },
        2,
    )
    .with_initial_backoff(Duration::from_millis(10));
    let grant = lifecycle.refresh("r").await?;
    assert!(!grant.access_token.is_empty());
    assert_eq!(h.mock.calls_to(REFRESH_TOKEN_PATH).await.len(), 3);
    Ok(())
}

#[tokio::test]
async fn shutdown_cuts_refresh_backoff_short() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    h.mock.rate_limit_refreshes(5);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let lifecycle = TokenLifecycle::new(
        Arc::clone(&h.client),
        h.store.clone(),
        AppCredentials { app_id: "test-app".into(), secret: "test-secret".into() },
        3,
    )
    .with_initial_backoff(Duration::from_secs(60))
    .with_shutdown(shutdown);
    let result = tokio::time::timeout(Duration::from_secs(5), lifecycle.refresh("r")).await?;
    assert!(
        matches!(result, Err(CredentialError::Platform(PlatformError::Api { code: 40100, .. }))),
        "{result:?}"
    );
    assert_eq!(h.mock.calls_to(REFRESH_TOKEN_PATH).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn ensure_fresh_leaves_distant_expiry_alone() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let far = epoch_secs() + 86_400;
    seed_advertiser(&h.store, 6, "a", "r", Some(far)).await?;
    let cred = h.store.get_advertiser(6).await?.ok_or_else(|| anyhow::anyhow!("missing 6"))?;

    let fresh = h.lifecycle.ensure_fresh(cred.clone()).await?;
    assert_eq!(fresh, cred);
    assert!(h.mock.calls_to(REFRESH_TOKEN_PATH).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn ensure_fresh_refreshes_near_expiry() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let soon = epoch_secs() + 120;
    seed_advertiser(&h.store, 7, "a", "r", Some(soon)).await?;
    let cred = h.store.get_advertiser(7).await?.ok_or_else(|| anyhow::anyhow!("missing 7"))?;

    let fresh = h.lifecycle.ensure_fresh(cred).await?;
    assert!(fresh.token_expire_at.unwrap_or_default() > soon);
    assert_ne!(fresh.access_token, "a");
    assert_eq!(h.store.get_advertiser(7).await?.map(|c| c.access_token), Some(fresh.access_token));
    Ok(())
}

#[tokio::test]
async fn ensure_fresh_without_refresh_token_is_missing() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 8, "a", "", None).await?;
    let cred = h.store.get_advertiser(8).await?.ok_or_else(|| anyhow::anyhow!("missing 8"))?;

    let result = h.lifecycle.ensure_fresh(cred).await;
    assert!(matches!(result, Err(CredentialError::CredentialMissing(8))), "{result:?}");
    Ok(())
}

#[tokio::test]
async fn refresh_advertiser_uses_stored_token() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    seed_advertiser(&h.store, 12, "a", "stored-refresh", Some(0)).await?;

    h.lifecycle.refresh_advertiser(12, None).await?;
    let calls = h.mock.calls_to(REFRESH_TOKEN_PATH).await;
    let call = &calls[0];
    assert_eq!(call.body["refresh_token"], "stored-refresh");
    assert_eq!(call.body["grant_type"], "refresh_token");
    Ok(())
}

#[tokio::test]
async fn refresh_advertiser_unknown_is_missing() -> anyhow::Result<()> {
    let h = Harness::start().await?;
    let result = h.lifecycle.refresh_advertiser(77, None).await;
    assert!(matches!(result, Err(CredentialError::CredentialMissing(77))), "{result:?}");
    Ok(())
}
