//! Tenant-scoped HTTP surface
//!
//! Every route except the OAuth callback authenticates through the tenant
//! auth seam before touching a store or adapter. Responses are discriminated
//! JSON: `{"ok": true, ...}` or `{"ok": false, "error": "..."}`. Provider
//! failures surfaced by adapters stay 200-with-`ok:false`; everything
//! unexpected becomes a 500 with the message.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use libomnicast::audit::SecurityEvent;
use libomnicast::error::{OAuthError, OmnicastError, StoreError};
use libomnicast::service::{ConnectionUpsert, PublishRequest};
use libomnicast::types::{PublishStatus, SocialPlatform};

use crate::auth::{AuthError, Identity};
use crate::state::AppState;

const RATE_WINDOW: Duration = Duration::from_secs(60);
const PUBLISH_RATE_MAX: usize = 30;
const TEST_RATE_MAX: usize = 30;
const SYNC_RATE_MAX: usize = 10;
const OAUTH_RATE_MAX: usize = 10;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/social/connections", get(list_connections))
        .route("/social/connections", post(upsert_connection))
        .route("/social/connections/test", post(test_connection))
        .route(
            "/social/connections/:tenant_id/:connection_id",
            delete(delete_connection),
        )
        .route("/social/publish", post(publish))
        .route("/social/history", get(history))
        .route("/social/analytics/sync", post(analytics_sync))
        .route("/social/analytics/sync-status", get(sync_status))
        .route("/social/oauth/start", post(oauth_start))
        .route("/social/oauth/callback", get(oauth_callback))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

/// Route-level failure, rendered as the discriminated JSON envelope.
pub enum ApiError {
    Auth(AuthError),
    Domain(OmnicastError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<OmnicastError> for ApiError {
    fn from(err: OmnicastError) -> Self {
        ApiError::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Auth(AuthError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, self.message())
            }
            ApiError::Auth(AuthError::Forbidden(_)) => (StatusCode::FORBIDDEN, self.message()),
            ApiError::Auth(AuthError::RateLimited(_)) => {
                (StatusCode::TOO_MANY_REQUESTS, self.message())
            }
            // Adapter-level failures are part of the operation contract, not
            // transport errors
            ApiError::Domain(OmnicastError::Platform(_)) => (StatusCode::OK, self.message()),
            ApiError::Domain(OmnicastError::OAuth(OAuthError::InvalidState)) => {
                (StatusCode::BAD_REQUEST, self.message())
            }
            ApiError::Domain(OmnicastError::OAuth(_)) => {
                (StatusCode::BAD_REQUEST, self.message())
            }
            ApiError::Domain(OmnicastError::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, self.message())
            }
            ApiError::Domain(OmnicastError::Store(StoreError::NotFound(_))) => {
                (StatusCode::NOT_FOUND, self.message())
            }
            ApiError::Domain(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.message()),
        };

        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

impl ApiError {
    fn message(&self) -> String {
        match self {
            ApiError::Auth(err) => err.to_string(),
            ApiError::Domain(err) => err.to_string(),
        }
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantQuery {
    tenant_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    tenant_id: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertBody {
    tenant_id: String,
    #[serde(flatten)]
    connection: ConnectionUpsert,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestBody {
    tenant_id: String,
    connection_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishBody {
    tenant_id: String,
    #[serde(flatten)]
    request: PublishRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncBody {
    tenant_id: String,
    #[serde(default)]
    card_ids: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthStartBody {
    tenant_id: String,
    platform: SocialPlatform,
    #[serde(default)]
    connection_id: Option<String>,
}

#[derive(Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    /// Set by the provider when the user denies the consent screen.
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn authorize(state: &AppState, headers: &HeaderMap, tenant_id: &str) -> Result<Identity, ApiError> {
    Ok(state.auth.require_tenant_scope(headers, tenant_id)?)
}

async fn list_connections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TenantQuery>,
) -> ApiResult {
    authorize(&state, &headers, &query.tenant_id)?;

    let connections = state.connections.list(&query.tenant_id).await?;
    Ok(Json(json!({ "ok": true, "connections": connections })))
}

async fn upsert_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpsertBody>,
) -> ApiResult {
    let identity = authorize(&state, &headers, &body.tenant_id)?;

    let connection = state
        .connections
        .upsert(&body.tenant_id, &identity.subject, body.connection)
        .await?;

    state.audit.record(
        SecurityEvent::new("connection_upsert", "allowed")
            .tenant(&body.tenant_id)
            .actor(&identity.subject)
            .detail(format!("{} ({})", connection.id, connection.platform)),
    );

    Ok(Json(json!({ "ok": true, "connection": connection })))
}

async fn test_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TestBody>,
) -> ApiResult {
    let identity = authorize(&state, &headers, &body.tenant_id)?;
    state
        .auth
        .rate_limit(&identity, "connection_test", TEST_RATE_MAX, RATE_WINDOW)?;

    let outcome = state
        .connections
        .test(&body.tenant_id, &body.connection_id)
        .await?;

    Ok(Json(json!({ "ok": true, "info": outcome.info })))
}

async fn delete_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((tenant_id, connection_id)): Path<(String, String)>,
) -> ApiResult {
    let identity = authorize(&state, &headers, &tenant_id)?;

    state.connections.delete(&tenant_id, &connection_id).await?;

    state.audit.record(
        SecurityEvent::new("connection_delete", "allowed")
            .tenant(&tenant_id)
            .actor(&identity.subject)
            .detail(connection_id),
    );

    Ok(Json(json!({ "ok": true })))
}

async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PublishBody>,
) -> ApiResult {
    let identity = authorize(&state, &headers, &body.tenant_id)?;
    state
        .auth
        .rate_limit(&identity, "publish", PUBLISH_RATE_MAX, RATE_WINDOW)?;

    let record = state
        .publisher
        .publish(&body.tenant_id, &identity.subject, body.request)
        .await?;

    let ok = record.status == PublishStatus::Success;
    Ok(Json(json!({
        "ok": ok,
        "error": record.error_message,
        "postUrl": record.post_url,
        "record": record,
    })))
}

async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    authorize(&state, &headers, &query.tenant_id)?;

    let records = state.publisher.history(&query.tenant_id, query.limit).await?;
    Ok(Json(json!({ "ok": true, "history": records })))
}

async fn analytics_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SyncBody>,
) -> ApiResult {
    let identity = authorize(&state, &headers, &body.tenant_id)?;
    state
        .auth
        .rate_limit(&identity, "analytics_sync", SYNC_RATE_MAX, RATE_WINDOW)?;

    let report = state
        .sync
        .sync_tenant(&body.tenant_id, body.card_ids.as_deref())
        .await?;

    Ok(Json(json!({
        "ok": true,
        "synced": report.synced,
        "errors": report.errors,
        "details": report.details,
    })))
}

async fn sync_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TenantQuery>,
) -> ApiResult {
    authorize(&state, &headers, &query.tenant_id)?;

    let status = state.sync.sync_status(&query.tenant_id).await?;
    Ok(Json(json!({ "ok": true, "status": status })))
}

async fn oauth_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OAuthStartBody>,
) -> ApiResult {
    let identity = authorize(&state, &headers, &body.tenant_id)?;
    state
        .auth
        .rate_limit(&identity, "oauth_start", OAUTH_RATE_MAX, RATE_WINDOW)?;

    let flow = state
        .oauth
        .start(
            &body.tenant_id,
            body.platform,
            &state.oauth_redirect_uri(),
            body.connection_id,
        )
        .await?;

    state.audit.record(
        SecurityEvent::new("oauth_start", "allowed")
            .tenant(&body.tenant_id)
            .actor(&identity.subject)
            .detail(body.platform.to_string()),
    );

    Ok(Json(json!({
        "ok": true,
        "authorizeUrl": flow.authorize_url,
        "state": flow.state,
        "connectionId": flow.connection_id,
    })))
}

/// Unauthenticated browser redirect; trust is carried entirely by the
/// single-use state token. Always renders a terminal HTML page that reports
/// the outcome to the opener window and closes the popup.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<String> {
    if let Some(error) = query.error_description.or(query.error) {
        return Html(callback_page(false, &error));
    }

    let (code, oauth_state) = match (query.code, query.state) {
        (Some(code), Some(state)) => (code, state),
        _ => return Html(callback_page(false, "missing code or state parameter")),
    };

    match state
        .oauth
        .callback(&code, &oauth_state, &state.oauth_redirect_uri())
        .await
    {
        Ok(connection) => {
            state.audit.record(
                SecurityEvent::new("oauth_callback", "allowed")
                    .detail(format!("{} ({})", connection.id, connection.platform)),
            );
            Html(callback_page(
                true,
                &format!("Connected {}", connection.display_name),
            ))
        }
        Err(error) => {
            state
                .audit
                .record(SecurityEvent::new("oauth_callback", "denied").detail(error.to_string()));
            Html(callback_page(false, &error.to_string()))
        }
    }
}

fn callback_page(ok: bool, message: &str) -> String {
    let status = if ok { "connected" } else { "failed" };
    let payload = json!({ "source": "omnicast-oauth", "status": status, "message": message });

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Omnicast</title></head>
<body>
<p>{}</p>
<script>
  if (window.opener) {{
    window.opener.postMessage({payload}, "*");
  }}
  window.close();
</script>
</body>
</html>"#,
        html_escape(message),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
