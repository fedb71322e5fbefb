//! Facebook page adapter (graph-style social API)
//!
//! Publishes to a page feed with a page-scoped access token. Feed posts come
//! back with composite `pageId_postId` identifiers; the adapter splits on the
//! first underscore to build the public post URL and re-joins the parts when
//! resolving engagement. No caption limit is enforced server-side.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::credentials::FacebookCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::{
    compose_message, read_provider_error, require, PlatformAdapter, PublishContent,
    PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, MediaType, SocialPlatform};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, Deserialize)]
struct PageIdentity {
    name: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: Option<String>,
    /// Photo uploads report the owning feed post separately.
    post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMetrics {
    reactions: Option<Summarized>,
    comments: Option<Summarized>,
    shares: Option<ShareCount>,
}

#[derive(Debug, Deserialize)]
struct Summarized {
    summary: Option<SummaryCount>,
}

#[derive(Debug, Deserialize)]
struct SummaryCount {
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ShareCount {
    count: Option<u64>,
}

pub struct FacebookAdapter {
    creds: FacebookCredentials,
    http: Client,
    api_base: String,
}

impl FacebookAdapter {
    pub fn new(creds: FacebookCredentials, http: Client) -> Self {
        Self::with_api_base(creds, http, DEFAULT_API_BASE)
    }

    pub fn with_api_base(creds: FacebookCredentials, http: Client, api_base: &str) -> Self {
        Self {
            creds,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn check<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }
        resp.json()
            .await
            .map_err(|e| PlatformError::from_http(e, context).into())
    }
}

/// Build the public URL for a provider-returned post ID.
///
/// Feed IDs are composite `ownerId_postId`; split on the first underscore.
/// IDs without a separator fall back to the generic object URL.
fn post_url_from_id(id: &str) -> String {
    match id.split_once('_') {
        Some((page_id, post_id)) => {
            format!("https://www.facebook.com/{page_id}/posts/{post_id}")
        }
        None => format!("https://www.facebook.com/{id}"),
    }
}

/// Recover the composite post ID from a URL this adapter produced.
fn post_id_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let mut segments = trimmed.rsplit('/');
    let post_id = segments.next()?;
    let marker = segments.next()?;
    if marker != "posts" {
        return None;
    }
    let page_id = segments.next()?;
    if page_id.is_empty() || post_id.is_empty() {
        return None;
    }
    Some(format!("{page_id}_{post_id}"))
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Facebook
    }

    async fn test(&self) -> Result<TestOutcome> {
        require("facebook", "pageAccessToken", &self.creds.page_access_token)?;

        let context = "verify page identity";
        let resp = self
            .http
            .get(format!("{}/me", self.api_base))
            .query(&[
                ("fields", "name,id"),
                ("access_token", self.creds.page_access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let identity: PageIdentity = Self::check(resp, context).await?;
        let name = identity.name.unwrap_or_else(|| "unnamed".to_string());
        let id = identity.id.unwrap_or_default();
        Ok(TestOutcome {
            info: format!("Page {name} ({id})"),
        })
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        require("facebook", "pageAccessToken", &self.creds.page_access_token)?;
        require("facebook", "pageId", &self.creds.page_id)?;

        let message = compose_message(&content.caption, &content.hashtags, None);

        let created: CreatedPost = match (&content.media_url, content.media_type) {
            (Some(url), Some(MediaType::Video)) => {
                let context = "publish video";
                let resp = self
                    .http
                    .post(format!("{}/{}/videos", self.api_base, self.creds.page_id))
                    .form(&[
                        ("file_url", url.as_str()),
                        ("description", message.as_str()),
                        ("access_token", self.creds.page_access_token.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| PlatformError::from_http(e, context))?;
                Self::check(resp, context).await?
            }
            (Some(url), _) => {
                let context = "publish photo";
                let resp = self
                    .http
                    .post(format!("{}/{}/photos", self.api_base, self.creds.page_id))
                    .form(&[
                        ("url", url.as_str()),
                        ("caption", message.as_str()),
                        ("access_token", self.creds.page_access_token.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| PlatformError::from_http(e, context))?;
                Self::check(resp, context).await?
            }
            (None, _) => {
                let context = "publish feed post";
                let resp = self
                    .http
                    .post(format!("{}/{}/feed", self.api_base, self.creds.page_id))
                    .form(&[
                        ("message", message.as_str()),
                        ("access_token", self.creds.page_access_token.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| PlatformError::from_http(e, context))?;
                Self::check(resp, context).await?
            }
        };

        // Photo uploads carry the feed post ID in `post_id`
        let post_url = created
            .post_id
            .or(created.id)
            .map(|id| post_url_from_id(&id));

        Ok(PublishOutcome { post_url })
    }

    async fn fetch_engagement(&self, post_url: Option<&str>) -> Result<EngagementMetrics> {
        require("facebook", "pageAccessToken", &self.creds.page_access_token)?;

        let post_id = post_url
            .and_then(post_id_from_url)
            .ok_or_else(|| {
                PlatformError::Provider(
                    "no resolvable post URL recorded for this page; publish first".to_string(),
                )
            })?;

        let context = "fetch post metrics";
        let resp = self
            .http
            .get(format!("{}/{}", self.api_base, post_id))
            .query(&[
                (
                    "fields",
                    "reactions.summary(true),comments.summary(true),shares",
                ),
                ("access_token", self.creds.page_access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let metrics: PostMetrics = Self::check(resp, context).await?;

        let summary_count =
            |s: &Option<Summarized>| s.as_ref().and_then(|s| s.summary.as_ref()).and_then(|c| c.total_count);

        Ok(EngagementMetrics {
            likes: summary_count(&metrics.reactions).unwrap_or(0),
            comments: summary_count(&metrics.comments).unwrap_or(0),
            shares: metrics.shares.and_then(|s| s.count).unwrap_or(0),
            reach: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_url_from_composite_id() {
        assert_eq!(
            post_url_from_id("1784000_9921733"),
            "https://www.facebook.com/1784000/posts/9921733"
        );
    }

    #[test]
    fn test_post_url_splits_on_first_underscore_only() {
        assert_eq!(
            post_url_from_id("1784000_99_21733"),
            "https://www.facebook.com/1784000/posts/99_21733"
        );
    }

    #[test]
    fn test_post_url_fallback_without_separator() {
        assert_eq!(
            post_url_from_id("9921733"),
            "https://www.facebook.com/9921733"
        );
    }

    #[test]
    fn test_post_id_round_trips_through_url() {
        let url = post_url_from_id("1784000_9921733");
        assert_eq!(post_id_from_url(&url).as_deref(), Some("1784000_9921733"));
    }

    #[test]
    fn test_post_id_rejects_foreign_urls() {
        assert_eq!(post_id_from_url("https://www.facebook.com/9921733"), None);
        assert_eq!(post_id_from_url("https://t.me/launches/42"), None);
        assert_eq!(post_id_from_url(""), None);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let adapter = FacebookAdapter::new(
            FacebookCredentials {
                page_access_token: String::new(),
                page_id: "1784000".to_string(),
            },
            Client::new(),
        );

        let err = adapter.test().await.unwrap_err();
        assert!(format!("{err}").contains("pageAccessToken"));
    }

    #[tokio::test]
    async fn test_engagement_without_post_url() {
        let adapter = FacebookAdapter::new(
            FacebookCredentials {
                page_access_token: "tok".to_string(),
                page_id: "1784000".to_string(),
            },
            Client::new(),
        );

        let err = adapter.fetch_engagement(None).await.unwrap_err();
        assert!(format!("{err}").contains("no resolvable post URL"));
    }
}
