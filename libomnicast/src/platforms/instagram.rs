//! Instagram media adapter (graph-style social API)
//!
//! Publishing is a two-step asynchronous protocol: create a media container,
//! wait for the provider to finish processing it (video only), then publish
//! the container. Processing is polled cooperatively on a fixed interval with
//! a bounded attempt count, so a stuck container resolves as an error instead
//! of hanging the request.
//!
//! Engagement lookup is an approximation: a stored permalink (short-code URL)
//! does not map back to a media ID without an extra API round trip, so the
//! adapter aggregates the account's most recent media instead of resolving
//! the exact post.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::credentials::InstagramCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::{
    compose_message, read_provider_error, require, PlatformAdapter, PublishContent,
    PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, MediaType, SocialPlatform};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";
const CAPTION_LIMIT: usize = 2200;

/// Video containers are polled every interval up to the attempt ceiling
/// (5 s x 8 = ~40 s by default).
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLL_ATTEMPTS: u32 = 8;

/// Number of recent media items aggregated for the engagement approximation.
const RECENT_MEDIA_LIMIT: u32 = 12;

#[derive(Debug, Deserialize)]
struct AccountInfo {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Permalink {
    permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaList {
    data: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    like_count: Option<u64>,
    comments_count: Option<u64>,
}

pub struct InstagramAdapter {
    creds: InstagramCredentials,
    http: Client,
    api_base: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl InstagramAdapter {
    pub fn new(creds: InstagramCredentials, http: Client) -> Self {
        Self::with_api_base(creds, http, DEFAULT_API_BASE)
    }

    pub fn with_api_base(creds: InstagramCredentials, http: Client, api_base: &str) -> Self {
        Self {
            creds,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    /// Override the processing poll cadence. Tests use sub-second intervals.
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
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

    async fn create_container(&self, content: &PublishContent, media_url: &str) -> Result<String> {
        let caption = compose_message(&content.caption, &content.hashtags, Some(CAPTION_LIMIT));
        let context = "create media container";

        let params: Vec<(&str, &str)> = match content.media_type {
            Some(MediaType::Video) => vec![
                ("video_url", media_url),
                ("media_type", "REELS"),
                ("caption", caption.as_str()),
                ("access_token", self.creds.access_token.as_str()),
            ],
            _ => vec![
                ("image_url", media_url),
                ("caption", caption.as_str()),
                ("access_token", self.creds.access_token.as_str()),
            ],
        };

        let resp = self
            .http
            .post(format!(
                "{}/{}/media",
                self.api_base, self.creds.instagram_user_id
            ))
            .form(&params)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let created: CreatedObject = Self::check(resp, context).await?;
        Ok(created.id)
    }

    /// Wait for a video container to reach a terminal processing state.
    async fn await_container(&self, container_id: &str) -> Result<()> {
        let context = "check container status";

        for _ in 0..self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let resp = self
                .http
                .get(format!("{}/{}", self.api_base, container_id))
                .query(&[
                    ("fields", "status_code"),
                    ("access_token", self.creds.access_token.as_str()),
                ])
                .send()
                .await
                .map_err(|e| PlatformError::from_http(e, context))?;

            let status: ContainerStatus = Self::check(resp, context).await?;

            match status.status_code.as_deref() {
                Some("FINISHED") => return Ok(()),
                Some("ERROR") => {
                    return Err(PlatformError::MediaProcessing(
                        "Instagram reported an error while processing the video".to_string(),
                    )
                    .into())
                }
                _ => {}
            }
        }

        Err(PlatformError::MediaProcessing(format!(
            "video processing did not finish within {} status checks",
            self.max_poll_attempts
        ))
        .into())
    }

    async fn publish_container(&self, container_id: &str) -> Result<String> {
        let context = "publish media container";
        let resp = self
            .http
            .post(format!(
                "{}/{}/media_publish",
                self.api_base, self.creds.instagram_user_id
            ))
            .form(&[
                ("creation_id", container_id),
                ("access_token", self.creds.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let published: CreatedObject = Self::check(resp, context).await?;
        Ok(published.id)
    }

    /// Best-effort permalink lookup; failure only costs the `postUrl`.
    async fn fetch_permalink(&self, media_id: &str) -> Option<String> {
        let resp = self
            .http
            .get(format!("{}/{}", self.api_base, media_id))
            .query(&[
                ("fields", "permalink"),
                ("access_token", self.creds.access_token.as_str()),
            ])
            .send()
            .await
            .ok()?;

        if !resp.status().is_success() {
            return None;
        }

        resp.json::<Permalink>().await.ok()?.permalink
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Instagram
    }

    async fn test(&self) -> Result<TestOutcome> {
        require("instagram", "accessToken", &self.creds.access_token)?;
        require(
            "instagram",
            "instagramUserId",
            &self.creds.instagram_user_id,
        )?;

        let context = "verify account identity";
        let resp = self
            .http
            .get(format!(
                "{}/{}",
                self.api_base, self.creds.instagram_user_id
            ))
            .query(&[
                ("fields", "username"),
                ("access_token", self.creds.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let account: AccountInfo = Self::check(resp, context).await?;
        let username = account.username.unwrap_or_else(|| "unknown".to_string());
        Ok(TestOutcome {
            info: format!("Instagram @{username}"),
        })
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        require("instagram", "accessToken", &self.creds.access_token)?;
        require(
            "instagram",
            "instagramUserId",
            &self.creds.instagram_user_id,
        )?;

        let media_url = content.media_url.as_deref().ok_or_else(|| {
            PlatformError::InvalidContent(
                "Instagram publishing requires an image or video URL".to_string(),
            )
        })?;

        let container_id = self.create_container(content, media_url).await?;

        if content.media_type == Some(MediaType::Video) {
            self.await_container(&container_id).await?;
        }

        let media_id = self.publish_container(&container_id).await?;
        let post_url = self.fetch_permalink(&media_id).await;

        Ok(PublishOutcome { post_url })
    }

    /// Aggregated counts over the account's most recent media.
    ///
    /// This is an approximation, not per-post attribution: the stored
    /// permalink cannot be resolved back to a media ID without another API
    /// call, so recent items stand in for the published post.
    async fn fetch_engagement(&self, _post_url: Option<&str>) -> Result<EngagementMetrics> {
        require("instagram", "accessToken", &self.creds.access_token)?;
        require(
            "instagram",
            "instagramUserId",
            &self.creds.instagram_user_id,
        )?;

        let context = "fetch recent media metrics";
        let resp = self
            .http
            .get(format!(
                "{}/{}/media",
                self.api_base, self.creds.instagram_user_id
            ))
            .query(&[
                ("fields", "like_count,comments_count"),
                ("limit", &RECENT_MEDIA_LIMIT.to_string()),
                ("access_token", self.creds.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let media: MediaList = Self::check(resp, context).await?;

        let mut metrics = EngagementMetrics::default();
        for item in media.data {
            metrics.likes += item.like_count.unwrap_or(0);
            metrics.comments += item.comments_count.unwrap_or(0);
        }

        Ok(metrics)
    }
}
