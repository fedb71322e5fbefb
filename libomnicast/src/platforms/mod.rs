//! Platform abstraction and adapter implementations
//!
//! One adapter per platform, all behind a single capability trait with three
//! operations: `test` (minimal authenticated read), `publish` (caption +
//! hashtags + optional media), and `fetch_engagement` (post metrics where the
//! platform exposes any).
//!
//! Adapters are infallible at the boundary in the sense that they never
//! panic and never surface a raw transport or provider error: required
//! credentials are checked before any network call (field-specific errors),
//! and every provider response is mapped into [`PlatformError`].

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{PlatformError, Result};
use crate::types::{EngagementMetrics, MediaType, SocialConnection, SocialPlatform};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod oauth1;
pub mod telegram;
pub mod whatsapp;
pub mod x;

// Mock adapter is available for all builds to support integration tests
pub mod mock;

/// Default per-request timeout for provider calls. A provider call past this
/// resolves as a timeout error instead of hanging the request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Content of one publish request, platform-independent.
#[derive(Debug, Clone)]
pub struct PublishContent {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
}

impl PublishContent {
    pub fn text(caption: impl Into<String>, hashtags: Vec<String>) -> Self {
        Self {
            caption: caption.into(),
            hashtags,
            media_url: None,
            media_type: None,
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, Default)]
pub struct PublishOutcome {
    /// Best-effort public URL of the created post. Absence is not an error;
    /// not every provider response makes one derivable.
    pub post_url: Option<String>,
}

/// Result of a successful connection test.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    /// Human-readable identity of the authenticated account.
    pub info: String,
}

/// Capability set every platform adapter implements.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> SocialPlatform;

    /// Issue a minimal authenticated read and report the account identity.
    async fn test(&self) -> Result<TestOutcome>;

    /// Publish composed content, dispatching on the presence and type of
    /// media.
    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome>;

    /// Fetch engagement counters for a published post.
    ///
    /// Platforms without a public analytics surface return an
    /// unsupported-operation error rather than zeros.
    async fn fetch_engagement(&self, post_url: Option<&str>) -> Result<EngagementMetrics>;
}

/// Builds the adapter for a connection.
///
/// A trait so service-level tests can substitute scripted adapters; the
/// production implementation is [`HttpAdapterFactory`].
pub trait AdapterFactory: Send + Sync {
    fn adapter_for(&self, connection: &SocialConnection) -> Box<dyn PlatformAdapter>;
}

/// Production factory: one shared HTTP client, exhaustive platform dispatch.
pub struct HttpAdapterFactory {
    http: Client,
}

impl HttpAdapterFactory {
    pub fn new() -> Self {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }
}

impl Default for HttpAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn adapter_for(&self, connection: &SocialConnection) -> Box<dyn PlatformAdapter> {
        match &connection.credentials {
            Credentials::Telegram(creds) => Box::new(telegram::TelegramAdapter::new(
                creds.clone(),
                self.http.clone(),
            )),
            Credentials::Whatsapp(creds) => Box::new(whatsapp::WhatsappAdapter::new(
                creds.clone(),
                self.http.clone(),
            )),
            Credentials::Facebook(creds) => Box::new(facebook::FacebookAdapter::new(
                creds.clone(),
                self.http.clone(),
            )),
            Credentials::Instagram(creds) => Box::new(instagram::InstagramAdapter::new(
                creds.clone(),
                self.http.clone(),
            )),
            Credentials::X(creds) => Box::new(x::XAdapter::new(creds.clone(), self.http.clone())),
            Credentials::Linkedin(creds) => Box::new(linkedin::LinkedinAdapter::new(
                creds.clone(),
                self.http.clone(),
            )),
        }
    }
}

/// Check a required credential field before any network call.
pub(crate) fn require<'a>(
    platform: &'static str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str> {
    if value.is_empty() {
        Err(PlatformError::missing(platform, field).into())
    } else {
        Ok(value)
    }
}

/// Compose caption and hashtags into the message body and truncate to the
/// platform's limit.
///
/// Hashtags get a `#` prefix when missing; the hashtag block is separated
/// from the caption by a blank line. Truncation counts characters, not bytes.
pub(crate) fn compose_message(
    caption: &str,
    hashtags: &[String],
    limit: Option<usize>,
) -> String {
    let mut message = caption.to_string();

    let tags: Vec<String> = hashtags
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| {
            let t = t.trim();
            if t.starts_with('#') {
                t.to_string()
            } else {
                format!("#{t}")
            }
        })
        .collect();

    if !tags.is_empty() {
        message.push_str("\n\n");
        message.push_str(&tags.join(" "));
    }

    match limit {
        Some(limit) => truncate_chars(&message, limit),
        None => message,
    }
}

pub(crate) fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        s.chars().take(limit).collect()
    }
}

/// Map a non-success provider response into a provider error, passing the
/// provider's own message through verbatim when one can be extracted.
pub(crate) async fn read_provider_error(resp: reqwest::Response, context: &str) -> PlatformError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    let message = extract_provider_message(&body)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                truncate_chars(body.trim(), 500)
            }
        });

    PlatformError::Provider(format!("{context}: {message}"))
}

/// Pull the human-readable message out of the common provider error shapes.
fn extract_provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    // Graph-style: {"error": {"message": "..."}}
    if let Some(msg) = value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Some(msg.to_string());
    }
    // Bot-API style: {"ok": false, "description": "..."}
    if let Some(msg) = value.get("description").and_then(|m| m.as_str()) {
        return Some(msg.to_string());
    }
    // {"errors": [{"message": "..."}]}
    if let Some(msg) = value
        .get("errors")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Some(msg.to_string());
    }
    // {"detail": "..."} or {"message": "..."} or {"error": "..."}
    for key in ["detail", "message", "error"] {
        if let Some(msg) = value.get(key).and_then(|m| m.as_str()) {
            return Some(msg.to_string());
        }
    }

    None
}
