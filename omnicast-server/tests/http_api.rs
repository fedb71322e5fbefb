//! HTTP surface tests
//!
//! Drives the router directly with tower, against in-memory stores and a
//! scripted adapter factory. Provider HTTP behavior is covered by the
//! adapter tests in the core crate; these tests pin the route contracts:
//! auth short-circuiting, masking at the boundary, the discriminated JSON
//! envelope, and ledger bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use libomnicast::audit::AuditLog;
use libomnicast::kv::{KvStore, SqliteKv};
use libomnicast::oauth::OAuthApps;
use libomnicast::platforms::mock::{MockAdapterFactory, MockBehavior};
use libomnicast::platforms::{AdapterFactory, HttpAdapterFactory};
use libomnicast::types::SocialPlatform;

use omnicast_server::auth::{ApiKeyAuth, TenantAuth};
use omnicast_server::routes;
use omnicast_server::state::{AppState, KvContentStore};

const API_KEY: &str = "key-acme";

async fn app_with(adapters: Arc<dyn AdapterFactory>) -> Router {
    let kv: Arc<dyn KvStore> = Arc::new(SqliteKv::in_memory().await.unwrap());
    let (audit, _task) = AuditLog::start(256, Duration::from_secs(3600));

    let mut api_keys = HashMap::new();
    api_keys.insert("acme".to_string(), API_KEY.to_string());
    let auth: Arc<dyn TenantAuth> = Arc::new(ApiKeyAuth::new(api_keys, audit.clone()));

    let content = Arc::new(KvContentStore::new(kv.clone()));

    let state = AppState::assemble(
        kv,
        adapters,
        auth,
        audit,
        content,
        OAuthApps::default(),
        "http://127.0.0.1:8080".to_string(),
        1,
    );

    routes::router(state)
}

async fn mock_app() -> (Router, MockAdapterFactory) {
    let factory = MockAdapterFactory::new();
    let app = app_with(Arc::new(factory.clone())).await;
    (app, factory)
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {API_KEY}"));

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn telegram_upsert_body() -> Value {
    json!({
        "tenantId": "acme",
        "id": "tg-1",
        "platform": "telegram",
        "displayName": "Launch channel",
        "credentials": { "botToken": "123456:secret", "channelId": "@launches" }
    })
}

#[tokio::test]
async fn unauthenticated_request_is_rejected_before_any_work() {
    let (app, factory) = mock_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/social/connections?tenantId=acme")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    // No adapter was ever constructed or called
    assert!(factory.published().is_empty());
}

#[tokio::test]
async fn wrong_tenant_key_is_forbidden() {
    let (app, _) = mock_app().await;

    let response = app
        .oneshot(authed(
            "GET",
            "/social/connections?tenantId=globex",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upsert_then_list_returns_masked_credentials() {
    let (app, _) = mock_app().await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/social/connections",
            Some(telegram_upsert_body()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    // Secrets never appear in the upsert response either
    assert_eq!(body["connection"]["credentials"]["botToken"], "");

    let response = app
        .oneshot(authed("GET", "/social/connections?tenantId=acme", None))
        .await
        .unwrap();
    let body = json_body(response).await;

    assert_eq!(body["ok"], true);
    let connections = body["connections"].as_array().unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0]["credentials"]["botToken"], "");
    assert_eq!(connections[0]["credentials"]["channelId"], "@launches");
}

#[tokio::test]
async fn publish_appends_history_entry() {
    let (app, factory) = mock_app().await;
    factory.set(
        SocialPlatform::Telegram,
        MockBehavior::publish_url("https://t.me/launches/42"),
    );

    app.clone()
        .oneshot(authed(
            "POST",
            "/social/connections",
            Some(telegram_upsert_body()),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/social/publish",
            Some(json!({
                "tenantId": "acme",
                "connectionId": "tg-1",
                "cardTitle": "Spring launch",
                "caption": "Hello",
                "hashtags": ["launch"]
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["postUrl"], "https://t.me/launches/42");

    // The adapter saw the raw caption and hashtags
    let published = factory.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.caption, "Hello");

    let response = app
        .oneshot(authed("GET", "/social/history?tenantId=acme", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "success");
    assert_eq!(history[0]["cardTitle"], "Spring launch");
    assert_eq!(history[0]["postUrl"], "https://t.me/launches/42");
}

#[tokio::test]
async fn provider_rejection_is_ok_false_with_error_entry() {
    let (app, factory) = mock_app().await;
    factory.set(
        SocialPlatform::Telegram,
        MockBehavior::publish_failure("Unauthorized"),
    );

    app.clone()
        .oneshot(authed(
            "POST",
            "/social/connections",
            Some(telegram_upsert_body()),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/social/publish",
            Some(json!({
                "tenantId": "acme",
                "connectionId": "tg-1",
                "caption": "Hello"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("Unauthorized"));

    let response = app
        .oneshot(authed("GET", "/social/history?tenantId=acme", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["history"][0]["status"], "error");
}

#[tokio::test]
async fn instagram_publish_without_media_is_recorded_as_error() {
    // Real adapter factory: the missing-media check fires before any
    // network call, so no mock server is needed.
    let app = app_with(Arc::new(HttpAdapterFactory::new())).await;

    app.clone()
        .oneshot(authed(
            "POST",
            "/social/connections",
            Some(json!({
                "tenantId": "acme",
                "id": "ig-1",
                "platform": "instagram",
                "displayName": "Brand account",
                "credentials": { "accessToken": "tok", "instagramUserId": "178" }
            })),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/social/publish",
            Some(json!({
                "tenantId": "acme",
                "connectionId": "ig-1",
                "caption": "No media attached"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("requires an image or video"));

    // Still a ledger entry, recorded as an error
    let response = app
        .oneshot(authed("GET", "/social/history?tenantId=acme", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "error");
}

#[tokio::test]
async fn delete_connection_removes_it() {
    let (app, _) = mock_app().await;

    app.clone()
        .oneshot(authed(
            "POST",
            "/social/connections",
            Some(telegram_upsert_body()),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed("DELETE", "/social/connections/acme/tg-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed("GET", "/social/connections?tenantId=acme", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert!(body["connections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_endpoint_persists_outcome() {
    let (app, _) = mock_app().await;

    app.clone()
        .oneshot(authed(
            "POST",
            "/social/connections",
            Some(telegram_upsert_body()),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/social/connections/test",
            Some(json!({ "tenantId": "acme", "connectionId": "tg-1" })),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["info"], "Mock account");

    let response = app
        .oneshot(authed("GET", "/social/connections?tenantId=acme", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["connections"][0]["lastTestStatus"], "ok");
}

#[tokio::test]
async fn sync_status_is_null_before_first_sync() {
    let (app, _) = mock_app().await;

    let response = app
        .oneshot(authed(
            "GET",
            "/social/analytics/sync-status?tenantId=acme",
            None,
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert!(body["status"].is_null());
}

#[tokio::test]
async fn sync_with_no_connections_returns_zero_report() {
    let (app, _) = mock_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/social/analytics/sync",
            Some(json!({ "tenantId": "acme" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["synced"], 0);
    assert_eq!(body["errors"], 0);
    assert!(body["details"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn oauth_start_rejects_manual_credential_platform() {
    let (app, _) = mock_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/social/oauth/start",
            Some(json!({ "tenantId": "acme", "platform": "telegram" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn oauth_callback_with_forged_state_renders_failure_page() {
    let (app, _) = mock_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/social/oauth/callback?code=abc&state=forged")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Terminal browser page, not a JSON error
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("\"status\":\"failed\""));
    assert!(page.contains("window.opener.postMessage"));
}

#[tokio::test]
async fn unknown_connection_is_not_found() {
    let (app, _) = mock_app().await;

    let response = app
        .oneshot(authed(
            "POST",
            "/social/publish",
            Some(json!({
                "tenantId": "acme",
                "connectionId": "ghost",
                "caption": "Hello"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
