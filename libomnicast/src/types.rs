//! Core types for Omnicast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credentials::Credentials;

/// The social platforms this engine can publish to.
///
/// Dispatch over platforms is an exhaustive `match` on this enum; adding a
/// variant forces every adapter registry and credential shape to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Telegram,
    Whatsapp,
    Facebook,
    Instagram,
    X,
    Linkedin,
}

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 6] = [
        SocialPlatform::Telegram,
        SocialPlatform::Whatsapp,
        SocialPlatform::Facebook,
        SocialPlatform::Instagram,
        SocialPlatform::X,
        SocialPlatform::Linkedin,
    ];

    /// Lowercase wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Telegram => "telegram",
            SocialPlatform::Whatsapp => "whatsapp",
            SocialPlatform::Facebook => "facebook",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::X => "x",
            SocialPlatform::Linkedin => "linkedin",
        }
    }

    /// Whether connections for this platform can be established through the
    /// OAuth authorization-code flow (as opposed to manual credential entry).
    pub fn supports_oauth(&self) -> bool {
        matches!(self, SocialPlatform::Facebook | SocialPlatform::Instagram)
    }
}

impl std::fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SocialPlatform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "telegram" => Ok(SocialPlatform::Telegram),
            "whatsapp" => Ok(SocialPlatform::Whatsapp),
            "facebook" => Ok(SocialPlatform::Facebook),
            "instagram" => Ok(SocialPlatform::Instagram),
            "x" | "twitter" => Ok(SocialPlatform::X),
            "linkedin" => Ok(SocialPlatform::Linkedin),
            _ => Err(format!("Unknown platform: '{}'", s)),
        }
    }
}

/// Result of the most recent connection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Ok,
    Error,
}

/// A tenant's connection to one platform account.
///
/// Serialization is the storage and wire shape (camelCase). Deserialization
/// validates the credential object against the platform tag, so a stored or
/// submitted connection can never carry credentials of the wrong shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialConnection {
    pub id: String,
    pub platform: SocialPlatform,
    pub display_name: String,
    pub credentials: Credentials,
    pub connected_at: DateTime<Utc>,
    pub connected_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_test_status: Option<TestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_test_error: Option<String>,
}

impl<'de> Deserialize<'de> for SocialConnection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            id: String,
            platform: SocialPlatform,
            #[serde(default)]
            display_name: String,
            #[serde(default)]
            credentials: serde_json::Value,
            connected_at: DateTime<Utc>,
            #[serde(default)]
            connected_by: String,
            #[serde(default)]
            last_tested_at: Option<DateTime<Utc>>,
            #[serde(default)]
            last_test_status: Option<TestStatus>,
            #[serde(default)]
            last_test_error: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let credentials = Credentials::from_value(raw.platform, raw.credentials)
            .map_err(serde::de::Error::custom)?;

        Ok(SocialConnection {
            id: raw.id,
            platform: raw.platform,
            display_name: raw.display_name,
            credentials,
            connected_at: raw.connected_at,
            connected_by: raw.connected_by,
            last_tested_at: raw.last_tested_at,
            last_test_status: raw.last_test_status,
            last_test_error: raw.last_test_error,
        })
    }
}

impl SocialConnection {
    /// Create a connection with fresh metadata and untested status.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        credentials: Credentials,
        connected_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform: credentials.platform(),
            display_name: display_name.into(),
            credentials,
            connected_at: Utc::now(),
            connected_by: connected_by.into(),
            last_tested_at: None,
            last_test_status: None,
            last_test_error: None,
        }
    }

    /// Copy of this connection with secret credential fields blanked.
    pub fn masked(&self) -> Self {
        let mut conn = self.clone();
        conn.credentials = conn.credentials.masked();
        conn
    }
}

/// Outcome of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Success,
    Error,
}

/// One entry in a tenant's append-only publish ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub id: String,
    pub card_title: String,
    pub platform: SocialPlatform,
    pub connection_name: String,
    pub status: PublishStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub published_at: DateTime<Utc>,
    pub published_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
}

impl PublishRecord {
    pub fn success(
        card_title: impl Into<String>,
        platform: SocialPlatform,
        connection_name: impl Into<String>,
        published_by: impl Into<String>,
        post_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            card_title: card_title.into(),
            platform,
            connection_name: connection_name.into(),
            status: PublishStatus::Success,
            error_message: None,
            published_at: Utc::now(),
            published_by: published_by.into(),
            post_url,
        }
    }

    pub fn failure(
        card_title: impl Into<String>,
        platform: SocialPlatform,
        connection_name: impl Into<String>,
        published_by: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            card_title: card_title.into(),
            platform,
            connection_name: connection_name.into(),
            status: PublishStatus::Error,
            error_message: Some(error.into()),
            published_at: Utc::now(),
            published_by: published_by.into(),
            post_url: None,
        }
    }
}

/// Media attachment type for a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// Engagement counters for one published post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub reach: u64,
}

/// Engagement payload merged into a content card by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementData {
    pub metrics: EngagementMetrics,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

/// A published content item, owned by the external content store.
///
/// The sync engine reads these and writes back `engagement_data` only; it
/// never touches status or ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCard {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub platform: Option<SocialPlatform>,
    pub status: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub engagement_data: Option<EngagementData>,
}

/// Single-use payload binding an OAuth authorization request to its callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStatePayload {
    pub tenant_id: String,
    pub platform: SocialPlatform,
    pub connection_id: String,
    pub issued_at: DateTime<Utc>,
}

/// Per-card outcome reported by an analytics sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDetail {
    pub card_id: String,
    pub card_title: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of one analytics sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synced: u32,
    pub errors: u32,
    pub details: Vec<SyncDetail>,
}

/// Latest sync summary persisted per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync_at: DateTime<Utc>,
    pub synced: u32,
    pub errors: u32,
    pub total_cards: u32,
}
