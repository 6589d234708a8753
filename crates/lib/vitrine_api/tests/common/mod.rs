//! Shared router fixtures: in-memory stores, a lazy pool that auth routes
//! never touch, and a seeded admin.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;
use vitrine_api::AppState;
use vitrine_api::config::ApiConfig;
use vitrine_core::auth::gate::IpAllowlist;
use vitrine_core::auth::ledger::MemoryRefreshLedger;
use vitrine_core::auth::principals::MemoryCredentialStore;
use vitrine_core::blob::local::LocalBlobStore;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub ledger: Arc<MemoryRefreshLedger>,
    _uploads: TempDir,
}

pub fn test_config(uploads: &TempDir) -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: "postgres://vitrine@127.0.0.1:1/vitrine".into(),
        access_secret: "test-access-secret".into(),
        refresh_secret: "test-refresh-secret".into(),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
        bcrypt_cost: 4,
        admin_email: None,
        admin_password: None,
        ip_allowlist: IpAllowlist::default(),
        allowed_origins: Vec::new(),
        uploads_dir: uploads.path().to_path_buf(),
        cloudinary: None,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(adjust: impl FnOnce(&mut ApiConfig)) -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let mut config = test_config(&uploads);
    adjust(&mut config);

    let pool = PgPoolOptions::new()
        .connect_lazy(&config.pg_connection_url)
        .expect("lazy pool");
    let ledger = Arc::new(MemoryRefreshLedger::new());
    let state = AppState::new(
        pool,
        config,
        Arc::new(MemoryCredentialStore::new()),
        ledger.clone(),
        Arc::new(LocalBlobStore::new(uploads.path())),
    )
    .expect("app state");

    let created = state
        .sessions
        .bootstrap_admin(Some(ADMIN_EMAIL), Some(ADMIN_PASSWORD))
        .await
        .expect("bootstrap");
    assert!(created);

    TestApp {
        router: vitrine_api::router(state.clone()),
        state,
        ledger,
        _uploads: uploads,
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// A request with a verbatim body and an optional content type.
pub fn raw_request(method: &str, uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Log in as the seeded admin; returns `(access, refresh)`.
pub async fn login(router: &Router) -> (String, String) {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (
        body["accessToken"].as_str().expect("accessToken").to_string(),
        body["refreshToken"].as_str().expect("refreshToken").to_string(),
    )
}
