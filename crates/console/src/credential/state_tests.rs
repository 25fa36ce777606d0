// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn payload(redirect: &str) -> StatePayload {
    StatePayload::from([("redirect_url".to_owned(), redirect.to_owned())])
}

#[tokio::test]
async fn state_validates_exactly_once() -> anyhow::Result<()> {
    let manager = OAuthStateManager::in_memory(DEFAULT_STATE_TTL);
    let token = manager.generate_and_save(payload("https://ui.local/")).await?;

    let first = manager.validate(&token).await?;
    assert_eq!(first.get("redirect_url").map(String::as_str), Some("https://ui.local/"));
    assert!(first.contains_key("created_at"));

    assert!(matches!(manager.validate(&token).await, Err(StateError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn unknown_and_empty_tokens_fail() {
    let manager = OAuthStateManager::in_memory(DEFAULT_STATE_TTL);
    assert!(matches!(manager.validate("never-issued").await, Err(StateError::NotFound)));
    assert!(matches!(manager.validate("").await, Err(StateError::NotFound)));
}

#[tokio::test(start_paused = true)]
async fn expired_state_is_rejected() -> anyhow::Result<()> {
    let manager = OAuthStateManager::in_memory(Duration::from_secs(600));
    let token = manager.generate_and_save(StatePayload::new()).await?;

    tokio::time::advance(Duration::from_secs(601)).await;
    assert!(matches!(manager.validate(&token).await, Err(StateError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn tokens_are_distinct() -> anyhow::Result<()> {
    let manager = OAuthStateManager::in_memory(DEFAULT_STATE_TTL);
    let a = manager.generate_and_save(StatePayload::new()).await?;
    let b = manager.generate_and_save(StatePayload::new()).await?;
    assert_ne!(a, b);
    manager.validate(&b).await?;
    manager.validate(&a).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn memory_store_purges_expired_on_put() -> anyhow::Result<()> {
    let store = MemoryStateStore::new();
    store.put("a", StatePayload::new(), Duration::from_secs(1)).await?;
    tokio::time::advance(Duration::from_secs(2)).await;
    store.put("b", StatePayload::new(), Duration::from_secs(60)).await?;
    assert_eq!(store.len().await, 1);
    assert!(store.take("b").await?.is_some());
    assert!(store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn keys_are_namespaced() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStateStore::new());
    let manager = OAuthStateManager::new(store.clone(), DEFAULT_STATE_TTL);
    let token = manager.generate_and_save(StatePayload::new()).await?;
    assert!(store.take(&format!("{STATE_KEY_PREFIX}{token}")).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn out_of_range_ttl_is_a_store_error() {
    let store = MemoryStateStore::new();
    let result = store.put("a", StatePayload::new(), Duration::MAX).await;
    assert!(matches!(result, Err(StateError::Store(_))), "{result:?}");
    assert!(store.is_empty().await);
}
