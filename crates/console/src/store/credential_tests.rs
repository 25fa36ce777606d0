// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{seed_advertiser, tokens};

#[tokio::test]
async fn upsert_creates_then_updates() -> anyhow::Result<()> {
    let store = Store::in_memory().await?;
    let meta = AdvertiserMeta { name: "Shop A".into(), company: "Acme".into(), ..Default::default() };
    store.upsert_authorized(42, &meta, &tokens("a1", "r1", 1_000)).await?;
    store.upsert_authorized(42, &AdvertiserMeta::default(), &tokens("a2", "r2", 2_000)).await?;

    let all = store.list_advertisers().await?;
    assert_eq!(all.len(), 1);
    let row = &all[0];
    assert_eq!(row.access_token, "a2");
    assert_eq!(row.refresh_token, "r2");
    assert_eq!(row.token_expire_at, Some(2_000));
    // Empty metadata keeps the previous snapshot.
    assert_eq!(row.name, "Shop A");
    assert_eq!(row.company, "Acme");
    Ok(())
}

#[tokio::test]
async fn list_expiring_selects_near_and_unknown_expiry() -> anyhow::Result<()> {
    let store = Store::in_memory().await?;
    seed_advertiser(&store, 1, "a", "r", Some(100)).await?;
    seed_advertiser(&store, 2, "a", "r", Some(10_000)).await?;
    seed_advertiser(&store, 3, "a", "r", None).await?;
    seed_advertiser(&store, 4, "", "", Some(50)).await?;

    let ids: Vec<i64> =
        store.list_expiring(500).await?.into_iter().map(|c| c.advertiser_id).collect();
    assert_eq!(ids, vec![1, 3]);
    Ok(())
}

#[tokio::test]
async fn list_authorized_skips_empty_and_deleted() -> anyhow::Result<()> {
    let store = Store::in_memory().await?;
    seed_advertiser(&store, 1, "a", "r", Some(100)).await?;
    seed_advertiser(&store, 2, "", "", None).await?;
    seed_advertiser(&store, 3, "a", "r", Some(100)).await?;
    store.soft_delete(3).await?;

    let ids: Vec<i64> =
        store.list_authorized().await?.into_iter().map(|c| c.advertiser_id).collect();
    assert_eq!(ids, vec![1]);
    assert!(store.get_advertiser(3).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn update_tokens_unknown_advertiser_is_not_found() -> anyhow::Result<()> {
    let store = Store::in_memory().await?;
    let result = store.update_tokens(404, &tokens("a", "r", 1)).await;
    assert!(matches!(result, Err(StoreError::NotFound(404))));
    Ok(())
}

#[tokio::test]
async fn balance_update_leaves_tokens_alone() -> anyhow::Result<()> {
    let store = Store::in_memory().await?;
    seed_advertiser(&store, 7, "acc", "ref", Some(500)).await?;
    let balance = Balance { balance: 12.34, valid_balance: 10.0, cash_balance: 2.34 };
    store.update_balance(7, &balance, 900).await?;

    let row = store.get_advertiser(7).await?.ok_or_else(|| anyhow::anyhow!("missing row"))?;
    assert_eq!(row.balance, 12.34);
    assert_eq!(row.last_sync_at, Some(900));
    assert_eq!(row.access_token, "acc");
    assert_eq!(row.token_expire_at, Some(500));
    Ok(())
}

#[test]
fn needs_refresh_threshold() {
    let mut cred = AdvertiserCredential {
        advertiser_id: 1,
        name: String::new(),
        company: String::new(),
        role: String::new(),
        status: String::new(),
        access_token: "a".into(),
        refresh_token: "r".into(),
        token_expire_at: None,
        balance: 0.0,
        valid_balance: 0.0,
        cash_balance: 0.0,
        last_sync_at: None,
    };
    assert!(cred.needs_refresh(1_000, 3_600));
    cred.token_expire_at = Some(1_000 + 3_599);
    assert!(cred.needs_refresh(1_000, 3_600));
    cred.token_expire_at = Some(1_000 + 3_600);
    assert!(!cred.needs_refresh(1_000, 3_600));
}

#[test]
fn status_view_has_no_tokens() -> anyhow::Result<()> {
    let cred = AdvertiserCredential {
        advertiser_id: 9,
        name: "n".into(),
        company: "c".into(),
        role: String::new(),
        status: String::new(),
        access_token: "secret-access".into(),
        refresh_token: "secret-refresh".into(),
        token_expire_at: Some(1),
        balance: 1.0,
        valid_balance: 1.0,
        cash_balance: 0.0,
        last_sync_at: None,
    };
    let json = serde_json::to_string(&cred.status())?;
    assert!(!json.contains("secret"));
    assert!(json.contains("\"authorized\":true"));
    Ok(())
}
