//! X adapter (legacy-signed REST API)
//!
//! Every call is authenticated with a per-request OAuth 1.0a signature over
//! the consumer key pair and user token pair. Posts are text-only at 280
//! characters; media would need the separate chunked-upload API, so a media
//! URL on the request does not change the endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::credentials::XCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::oauth1::Oauth1Signer;
use crate::platforms::{
    compose_message, read_provider_error, require, PlatformAdapter, PublishContent,
    PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, SocialPlatform};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const TEXT_LIMIT: usize = 280;

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: UserInfo,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetEnvelope {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MetricsEnvelope {
    data: TweetMetrics,
}

#[derive(Debug, Deserialize)]
struct TweetMetrics {
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize, Default)]
struct PublicMetrics {
    like_count: Option<u64>,
    reply_count: Option<u64>,
    retweet_count: Option<u64>,
    quote_count: Option<u64>,
    impression_count: Option<u64>,
}

pub struct XAdapter {
    creds: XCredentials,
    http: Client,
    api_base: String,
}

impl XAdapter {
    pub fn new(creds: XCredentials, http: Client) -> Self {
        Self::with_api_base(creds, http, DEFAULT_API_BASE)
    }

    pub fn with_api_base(creds: XCredentials, http: Client, api_base: &str) -> Self {
        Self {
            creds,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn require_all(&self) -> Result<()> {
        require("x", "apiKey", &self.creds.api_key)?;
        require("x", "apiSecret", &self.creds.api_secret)?;
        require("x", "accessToken", &self.creds.access_token)?;
        require("x", "accessTokenSecret", &self.creds.access_token_secret)?;
        Ok(())
    }

    fn signer(&self) -> Oauth1Signer {
        Oauth1Signer::new(
            self.creds.api_key.clone(),
            self.creds.api_secret.clone(),
            self.creds.access_token.clone(),
            self.creds.access_token_secret.clone(),
        )
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

/// The status ID is the last path segment of the post URL.
fn tweet_id_from_url(url: &str) -> Option<String> {
    let id = url.trim_end_matches('/').rsplit('/').next()?;
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

#[async_trait]
impl PlatformAdapter for XAdapter {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::X
    }

    async fn test(&self) -> Result<TestOutcome> {
        self.require_all()?;

        let context = "verify account identity";
        let url = format!("{}/2/users/me", self.api_base);
        let authorization = self.signer().authorization_header("GET", &url, &[]);

        let resp = self
            .http
            .get(&url)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let user: UserEnvelope = Self::check(resp, context).await?;
        let username = user.data.username.unwrap_or_else(|| "unknown".to_string());
        let info = match user.data.name {
            Some(name) => format!("@{username} ({name})"),
            None => format!("@{username}"),
        };
        Ok(TestOutcome { info })
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        self.require_all()?;

        let text = compose_message(&content.caption, &content.hashtags, Some(TEXT_LIMIT));

        let context = "create post";
        let url = format!("{}/2/tweets", self.api_base);
        // JSON bodies do not participate in the signature; only oauth_*
        // parameters are signed here.
        let authorization = self.signer().authorization_header("POST", &url, &[]);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", authorization)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let created: TweetEnvelope = Self::check(resp, context).await?;

        Ok(PublishOutcome {
            post_url: Some(format!(
                "https://x.com/i/web/status/{}",
                created.data.id
            )),
        })
    }

    async fn fetch_engagement(&self, post_url: Option<&str>) -> Result<EngagementMetrics> {
        self.require_all()?;

        let tweet_id = post_url.and_then(tweet_id_from_url).ok_or_else(|| {
            PlatformError::Provider(
                "no resolvable post URL recorded for this account; publish first".to_string(),
            )
        })?;

        let context = "fetch post metrics";
        let url = format!("{}/2/tweets/{}", self.api_base, tweet_id);
        // Query parameters participate in the signature.
        let authorization = self.signer().authorization_header(
            "GET",
            &url,
            &[("tweet.fields", "public_metrics")],
        );

        let resp = self
            .http
            .get(&url)
            .query(&[("tweet.fields", "public_metrics")])
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let envelope: MetricsEnvelope = Self::check(resp, context).await?;
        let metrics = envelope.data.public_metrics.unwrap_or_default();

        Ok(EngagementMetrics {
            likes: metrics.like_count.unwrap_or(0),
            comments: metrics.reply_count.unwrap_or(0),
            shares: metrics.retweet_count.unwrap_or(0) + metrics.quote_count.unwrap_or(0),
            reach: metrics.impression_count.unwrap_or(0),
        })
    }
}
