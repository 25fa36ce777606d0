// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a mock advertising platform, builders, and
//! assertion helpers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ConsoleConfig;
use crate::credential::oauth::{ACCESS_TOKEN_PATH, REFRESH_TOKEN_PATH};
use crate::credential::{AppCredentials, TokenLifecycle};
use crate::store::{epoch_secs, Store, StoredTokens};
use crate::upstream::advertiser::{
    AdvertiserInfo, ReportRow, Wallet, ADVERTISER_INFO_PATH, DAILY_REPORT_PATH,
    IMAGE_UPLOAD_PATH, WALLET_PATH,
};
use crate::upstream::client::ACCESS_TOKEN_HEADER;
use crate::upstream::PlatformClient;

/// Authorization code the mock platform accepts.
pub const VALID_AUTH_CODE: &str = "valid-auth-code";

/// Lifetime of tokens minted by the mock platform.
pub const MOCK_EXPIRES_IN: i64 = 86_400;

/// Default wallet returned for advertisers without an explicit one.
pub const DEFAULT_WALLET: Wallet = Wallet { balance: 123_456, valid_balance: 100_000, cash_balance: 23_456 };

/// One request observed by the mock platform.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub access_token: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    granted: Mutex<Vec<AdvertiserInfo>>,
    failing_info: AtomicBool,
    failing_wallets: Mutex<HashSet<i64>>,
    wallets: Mutex<HashMap<i64, Wallet>>,
    rejected_refresh: Mutex<HashSet<String>>,
    lifetimeless_refresh: Mutex<HashSet<String>>,
    rate_limited_refreshes: AtomicU32,
    reports: Mutex<HashMap<i64, Vec<ReportRow>>>,
    calls: Mutex<Vec<RecordedCall>>,
    token_seq: AtomicU64,
}

impl MockState {
    async fn record(
        &self,
        path: &str,
        headers: &HeaderMap,
        query: BTreeMap<String, String>,
        body: Value,
    ) {
        let access_token = headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.calls.lock().await.push(RecordedCall {
            path: path.to_owned(),
            query,
            access_token,
            body,
        });
    }

    fn mint(&self) -> Value {
        let n = self.token_seq.fetch_add(1, Ordering::Relaxed) + 1;
        json!({
            "access_token": format!("access-{n}"),
            "refresh_token": format!("refresh-{n}"),
            "expires_in": MOCK_EXPIRES_IN,
            "refresh_token_expires_in": 2_592_000,
        })
    }
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "code": 0, "message": "OK", "request_id": "mock-req", "data": data }))
}

fn fail(code: i64, message: &str) -> Json<Value> {
    Json(json!({ "code": code, "message": message, "request_id": "mock-req", "data": {} }))
}

fn query_i64(query: &BTreeMap<String, String>, key: &str) -> i64 {
    query.get(key).and_then(|v| v.parse().ok()).unwrap_or_default()
}

async fn access_token(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    s.record(ACCESS_TOKEN_PATH, &headers, BTreeMap::new(), body.clone()).await;
    if body["auth_code"] != VALID_AUTH_CODE {
        return fail(40103, "auth_code is invalid");
    }
    let mut grant = s.mint();
    let ids: Vec<i64> = s.granted.lock().await.iter().map(|a| a.id).collect();
    grant["advertiser_ids"] = json!(ids);
    ok(grant)
}

async fn refresh_token(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    s.record(REFRESH_TOKEN_PATH, &headers, BTreeMap::new(), body.clone()).await;
    let token = body["refresh_token"].as_str().unwrap_or_default().to_owned();
    if s.rejected_refresh.lock().await.contains(&token) {
        return fail(40107, "refresh_token expired");
    }
    let limited = s
        .rate_limited_refreshes
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok();
    if limited {
        return fail(40100, "too many requests");
    }
    let mut grant = s.mint();
    if s.lifetimeless_refresh.lock().await.contains(&token) {
        if let Some(fields) = grant.as_object_mut() {
            fields.remove("expires_in");
        }
    }
    ok(grant)
}

async fn get_advertiser_info(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    s.record(ADVERTISER_INFO_PATH, &headers, query.clone(), Value::Null).await;
    if s.failing_info.load(Ordering::Relaxed) {
        return fail(40002, "no permission");
    }
    let wanted: Vec<i64> = query
        .get("advertiser_ids")
        .and_then(|v| serde_json::from_str(v).ok())
        .unwrap_or_default();
    let list: Vec<AdvertiserInfo> =
        s.granted.lock().await.iter().filter(|a| wanted.contains(&a.id)).cloned().collect();
    ok(json!({ "list": list }))
}

async fn wallet(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    s.record(WALLET_PATH, &headers, query.clone(), Value::Null).await;
    let id = query_i64(&query, "advertiser_id");
    if s.failing_wallets.lock().await.contains(&id) {
        return fail(40001, "advertiser has no wallet access");
    }
    let wallet = s.wallets.lock().await.get(&id).copied().unwrap_or(DEFAULT_WALLET);
    ok(json!(wallet))
}

async fn daily_report(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    s.record(DAILY_REPORT_PATH, &headers, query.clone(), Value::Null).await;
    let id = query_i64(&query, "advertiser_id");
    let page = query_i64(&query, "page").max(1) as usize;
    let page_size = query_i64(&query, "page_size").max(1) as usize;
    let rows = s.reports.lock().await.get(&id).cloned().unwrap_or_default();
    let total_page = rows.len().div_ceil(page_size);
    let list: Vec<ReportRow> = rows.iter().skip((page - 1) * page_size).take(page_size).cloned().collect();
    ok(json!({
        "list": list,
        "page_info": {
            "page": page,
            "page_size": page_size,
            "total_number": rows.len(),
            "total_page": total_page,
        },
    }))
}

async fn image_upload(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<Value> {
    let mut fields = serde_json::Map::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let Ok(bytes) = field.bytes().await else {
            return fail(40000, "bad multipart body");
        };
        match file_name {
            Some(file_name) => {
                fields.insert(name, json!({ "file_name": file_name, "size": bytes.len() }));
            }
            None => {
                fields.insert(name, json!(String::from_utf8_lossy(&bytes)));
            }
        }
    }
    let body = Value::Object(fields);
    s.record(IMAGE_UPLOAD_PATH, &headers, BTreeMap::new(), body.clone()).await;
    let size = body["image_file"]["size"].as_u64().unwrap_or_default();
    ok(json!({ "id": "img-1", "size": size, "signature": "sig", "fields": body }))
}

async fn echo_get(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Json<Value> {
    s.record("/test/echo", &headers, query.clone(), Value::Null).await;
    ok(json!({ "query": query }))
}

async fn echo_post(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    s.record("/test/echo", &headers, BTreeMap::new(), body.clone()).await;
    ok(json!({ "body": body }))
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    (StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), "upstream exploded")
}

async fn api_error() -> Json<Value> {
    fail(40002, "no permission")
}

async fn garbage() -> &'static str {
    "<html>not an envelope</html>"
}

/// An in-process stand-in for the advertising platform on an ephemeral port.
///
/// Stops serving when dropped.
pub struct MockPlatform {
    base_url: String,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockPlatform {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        let router = Router::new()
            .route(ACCESS_TOKEN_PATH, post(access_token))
            .route(REFRESH_TOKEN_PATH, post(refresh_token))
            .route(ADVERTISER_INFO_PATH, get(get_advertiser_info))
            .route(WALLET_PATH, get(wallet))
            .route(DAILY_REPORT_PATH, get(daily_report))
            .route(IMAGE_UPLOAD_PATH, post(image_upload))
            .route("/test/echo", get(echo_get).post(echo_post))
            .route("/test/status/{code}", get(status))
            .route("/test/api-error", get(api_error))
            .route("/test/garbage", get(garbage))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(token.cancelled_owned()).await;
        });

        Ok(Self { base_url: format!("http://{addr}"), state, shutdown })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> PlatformClient {
        PlatformClient::new(self.base_url.clone(), Duration::from_secs(5))
    }

    /// Advertisers covered by the next authorization grant.
    pub async fn grant_advertisers(&self, infos: Vec<AdvertiserInfo>) {
        *self.state.granted.lock().await = infos;
    }

    pub fn fail_info(&self, failing: bool) {
        self.state.failing_info.store(failing, Ordering::Relaxed);
    }

    pub async fn fail_wallet(&self, advertiser_id: i64) {
        self.state.failing_wallets.lock().await.insert(advertiser_id);
    }

    pub async fn set_wallet(&self, advertiser_id: i64, wallet: Wallet) {
        self.state.wallets.lock().await.insert(advertiser_id, wallet);
    }

    pub async fn reject_refresh(&self, refresh_token: &str) {
        self.state.rejected_refresh.lock().await.insert(refresh_token.to_owned());
    }

    /// Answer refreshes of `refresh_token` with a grant that has no `expires_in`.
    pub async fn omit_refresh_lifetime(&self, refresh_token: &str) {
        self.state.lifetimeless_refresh.lock().await.insert(refresh_token.to_owned());
    }

    /// Answer the next `n` refreshes with a rate-limit code.
    pub fn rate_limit_refreshes(&self, n: u32) {
        self.state.rate_limited_refreshes.store(n, Ordering::Relaxed);
    }

    pub async fn set_report(&self, advertiser_id: i64, rows: Vec<ReportRow>) {
        self.state.reports.lock().await.insert(advertiser_id, rows);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().await.clone()
    }

    pub async fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.state.calls.lock().await.iter().filter(|c| c.path == path).cloned().collect()
    }
}

impl Drop for MockPlatform {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Mock platform, in-memory store, and a lifecycle wired to both.
pub struct Harness {
    pub mock: MockPlatform,
    pub store: Store,
    pub client: Arc<PlatformClient>,
    pub lifecycle: Arc<TokenLifecycle>,
}

impl Harness {
    pub async fn start() -> anyhow::Result<Self> {
        let mock = MockPlatform::start().await?;
        let store = Store::in_memory().await?;
        let client = Arc::new(mock.client());
        let lifecycle = Arc::new(TokenLifecycle::new(
            Arc::clone(&client),
            store.clone(),
            AppCredentials { app_id: "test-app".into(), secret: "test-secret".into() },
            0,
        ));
        Ok(Self { mock, store, client, lifecycle })
    }
}

/// Config with test-friendly defaults pointing at `api_base_url`.
pub fn test_config(api_base_url: &str) -> ConsoleConfig {
    let mut config = ConsoleConfig::parse_from([
        "adconsole",
        "--app-id",
        "test-app",
        "--app-secret",
        "test-secret",
        "--port",
        "0",
    ]);
    config.api_base_url = api_base_url.to_owned();
    config.database_url = "sqlite::memory:".to_owned();
    config.refresh_retries = 0;
    config
}

pub fn tokens(access: &str, refresh: &str, expire_at: i64) -> StoredTokens {
    StoredTokens {
        access_token: access.to_owned(),
        refresh_token: refresh.to_owned(),
        expire_at,
    }
}

/// Insert an advertiser row directly, including states the lifecycle never
/// writes (unknown expiry, no tokens).
pub async fn seed_advertiser(
    store: &Store,
    advertiser_id: i64,
    access_token: &str,
    refresh_token: &str,
    token_expire_at: Option<i64>,
) -> anyhow::Result<()> {
    let now = epoch_secs();
    sqlx::query(
        "INSERT INTO ad_advertiser \
            (advertiser_id, name, access_token, refresh_token, token_expire_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(advertiser_id)
    .bind(format!("advertiser-{advertiser_id}"))
    .bind(access_token)
    .bind(refresh_token)
    .bind(token_expire_at)
    .bind(now)
    .bind(now)
    .execute(store.pool())
    .await?;
    Ok(())
}

pub fn advertiser_info(id: i64, name: &str) -> AdvertiserInfo {
    AdvertiserInfo {
        id,
        name: name.to_owned(),
        role: "ROLE_ADVERTISER".to_owned(),
        status: "STATUS_ENABLE".to_owned(),
        company: format!("{name} Co."),
    }
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
