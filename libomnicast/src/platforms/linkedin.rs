//! LinkedIn content adapter (professional-network API)
//!
//! Publishes UGC shares as a member or organization, authenticated with a
//! bearer token. Media is attached as a linked article URL; binary uploads
//! go through a separate asset API and are not part of this integration.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::credentials::LinkedinCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::{
    compose_message, read_provider_error, require, PlatformAdapter, PublishContent,
    PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, SocialPlatform};

const DEFAULT_API_BASE: &str = "https://api.linkedin.com";
const TEXT_LIMIT: usize = 3000;

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedShare {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialActions {
    likes_summary: Option<LikesSummary>,
    comments_summary: Option<CommentsSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikesSummary {
    total_likes: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentsSummary {
    aggregated_total_comments: Option<u64>,
    total_first_level_comments: Option<u64>,
}

pub struct LinkedinAdapter {
    creds: LinkedinCredentials,
    http: Client,
    api_base: String,
}

impl LinkedinAdapter {
    pub fn new(creds: LinkedinCredentials, http: Client) -> Self {
        Self::with_api_base(creds, http, DEFAULT_API_BASE)
    }

    pub fn with_api_base(creds: LinkedinCredentials, http: Client, api_base: &str) -> Self {
        Self {
            creds,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn share_payload(&self, content: &PublishContent) -> serde_json::Value {
        let message = compose_message(&content.caption, &content.hashtags, Some(TEXT_LIMIT));

        let share_content = match &content.media_url {
            Some(url) => serde_json::json!({
                "shareCommentary": { "text": message },
                "shareMediaCategory": "ARTICLE",
                "media": [{
                    "status": "READY",
                    "originalUrl": url,
                }],
            }),
            None => serde_json::json!({
                "shareCommentary": { "text": message },
                "shareMediaCategory": "NONE",
            }),
        };

        serde_json::json!({
            "author": self.creds.author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": share_content,
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            },
        })
    }
}

/// Share URNs embed in the public feed URL verbatim.
fn post_url_from_urn(urn: &str) -> String {
    format!("https://www.linkedin.com/feed/update/{urn}")
}

fn urn_from_post_url(url: &str) -> Option<String> {
    let urn = url.trim_end_matches('/').rsplit('/').next()?;
    if urn.starts_with("urn:li:") {
        Some(urn.to_string())
    } else {
        None
    }
}

#[async_trait]
impl PlatformAdapter for LinkedinAdapter {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Linkedin
    }

    async fn test(&self) -> Result<TestOutcome> {
        require("linkedin", "accessToken", &self.creds.access_token)?;

        let context = "verify member identity";
        let resp = self
            .http
            .get(format!("{}/v2/userinfo", self.api_base))
            .bearer_auth(&self.creds.access_token)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }

        let user: UserInfo = resp
            .json()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let identity = user
            .name
            .or(user.email)
            .unwrap_or_else(|| "unknown member".to_string());
        Ok(TestOutcome {
            info: format!("LinkedIn {identity}"),
        })
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        require("linkedin", "accessToken", &self.creds.access_token)?;
        require("linkedin", "authorUrn", &self.creds.author_urn)?;

        let context = "create share";
        let resp = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(&self.creds.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&self.share_payload(content))
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }

        // The share URN arrives in the x-restli-id header; newer API
        // revisions also echo it in the body.
        let header_urn = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body_urn = resp.json::<CreatedShare>().await.ok().and_then(|c| c.id);

        Ok(PublishOutcome {
            post_url: header_urn.or(body_urn).map(|urn| post_url_from_urn(&urn)),
        })
    }

    async fn fetch_engagement(&self, post_url: Option<&str>) -> Result<EngagementMetrics> {
        require("linkedin", "accessToken", &self.creds.access_token)?;

        let urn = post_url.and_then(urn_from_post_url).ok_or_else(|| {
            PlatformError::Provider(
                "no resolvable share URL recorded for this account; publish first".to_string(),
            )
        })?;

        let context = "fetch share metrics";
        let resp = self
            .http
            .get(format!(
                "{}/v2/socialActions/{}",
                self.api_base,
                urlencoding::encode(&urn)
            ))
            .bearer_auth(&self.creds.access_token)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }

        let actions: SocialActions = resp
            .json()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let comments = actions
            .comments_summary
            .as_ref()
            .and_then(|c| c.aggregated_total_comments.or(c.total_first_level_comments))
            .unwrap_or(0);

        Ok(EngagementMetrics {
            likes: actions
                .likes_summary
                .and_then(|l| l.total_likes)
                .unwrap_or(0),
            comments,
            shares: 0,
            reach: 0,
        })
    }
}
