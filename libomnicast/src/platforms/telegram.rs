//! Telegram bot-messaging adapter
//!
//! Publishes through the Bot API to a channel or chat the bot administers.
//! Text messages allow 4096 characters; media captions 1024. The Bot API has
//! no engagement surface, so `fetch_engagement` reports unsupported instead
//! of fabricating zeros.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::credentials::TelegramCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::{
    compose_message, read_provider_error, require, PlatformAdapter, PublishContent,
    PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, MediaType, SocialPlatform};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const TEXT_LIMIT: usize = 4096;
const CAPTION_LIMIT: usize = 1024;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotInfo {
    username: Option<String>,
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: Option<Chat>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    username: Option<String>,
}

pub struct TelegramAdapter {
    creds: TelegramCredentials,
    http: Client,
    api_base: String,
}

impl TelegramAdapter {
    pub fn new(creds: TelegramCredentials, http: Client) -> Self {
        Self::with_api_base(creds, http, DEFAULT_API_BASE)
    }

    pub fn with_api_base(creds: TelegramCredentials, http: Client, api_base: &str) -> Self {
        Self {
            creds,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.creds.bot_token, method)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }

        let api: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !api.ok {
            let message = api
                .description
                .unwrap_or_else(|| "request rejected".to_string());
            return Err(PlatformError::Provider(format!("{context}: {message}")).into());
        }

        api.result.ok_or_else(|| {
            PlatformError::Provider(format!("{context}: response carried no result")).into()
        })
    }

    /// Public channels (`@handle`) have derivable message URLs; numeric chat
    /// IDs do not.
    fn post_url(&self, sent: &SentMessage) -> Option<String> {
        let handle = if let Some(stripped) = self.creds.channel_id.strip_prefix('@') {
            Some(stripped.to_string())
        } else {
            sent.chat.as_ref().and_then(|c| c.username.clone())
        };

        handle.map(|h| format!("https://t.me/{}/{}", h, sent.message_id))
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Telegram
    }

    async fn test(&self) -> Result<TestOutcome> {
        require("telegram", "botToken", &self.creds.bot_token)?;

        let bot: BotInfo = self
            .call("getMe", serde_json::json!({}), "verify bot identity")
            .await?;

        let username = bot.username.unwrap_or_else(|| "unknown".to_string());
        let info = match bot.first_name {
            Some(name) => format!("Bot @{username} ({name})"),
            None => format!("Bot @{username}"),
        };
        Ok(TestOutcome { info })
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        require("telegram", "botToken", &self.creds.bot_token)?;
        require("telegram", "channelId", &self.creds.channel_id)?;

        let sent: SentMessage = match (&content.media_url, content.media_type) {
            (Some(url), Some(MediaType::Video)) => {
                let caption =
                    compose_message(&content.caption, &content.hashtags, Some(CAPTION_LIMIT));
                self.call(
                    "sendVideo",
                    serde_json::json!({
                        "chat_id": self.creds.channel_id,
                        "video": url,
                        "caption": caption,
                    }),
                    "send video",
                )
                .await?
            }
            (Some(url), _) => {
                let caption =
                    compose_message(&content.caption, &content.hashtags, Some(CAPTION_LIMIT));
                self.call(
                    "sendPhoto",
                    serde_json::json!({
                        "chat_id": self.creds.channel_id,
                        "photo": url,
                        "caption": caption,
                    }),
                    "send photo",
                )
                .await?
            }
            (None, _) => {
                let text = compose_message(&content.caption, &content.hashtags, Some(TEXT_LIMIT));
                self.call(
                    "sendMessage",
                    serde_json::json!({
                        "chat_id": self.creds.channel_id,
                        "text": text,
                    }),
                    "send message",
                )
                .await?
            }
        };

        Ok(PublishOutcome {
            post_url: self.post_url(&sent),
        })
    }

    async fn fetch_engagement(&self, _post_url: Option<&str>) -> Result<EngagementMetrics> {
        Err(PlatformError::Unsupported(
            "Telegram's Bot API does not expose view or reaction metrics for channel posts"
                .to_string(),
        )
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(channel_id: &str) -> TelegramAdapter {
        TelegramAdapter::new(
            TelegramCredentials {
                bot_token: "123456:abc".to_string(),
                channel_id: channel_id.to_string(),
            },
            Client::new(),
        )
    }

    #[test]
    fn test_post_url_from_public_handle() {
        let sent = SentMessage {
            message_id: 42,
            chat: None,
        };
        assert_eq!(
            adapter("@launches").post_url(&sent).as_deref(),
            Some("https://t.me/launches/42")
        );
    }

    #[test]
    fn test_post_url_from_chat_username() {
        let sent = SentMessage {
            message_id: 7,
            chat: Some(Chat {
                username: Some("launches".to_string()),
            }),
        };
        assert_eq!(
            adapter("-1001234567890").post_url(&sent).as_deref(),
            Some("https://t.me/launches/7")
        );
    }

    #[test]
    fn test_post_url_absent_for_private_chat() {
        let sent = SentMessage {
            message_id: 7,
            chat: Some(Chat { username: None }),
        };
        assert_eq!(adapter("-1001234567890").post_url(&sent), None);
    }

    #[tokio::test]
    async fn test_missing_bot_token_fails_before_network() {
        let adapter = TelegramAdapter::new(
            TelegramCredentials {
                bot_token: String::new(),
                channel_id: "@launches".to_string(),
            },
            Client::new(),
        );

        let err = adapter.test().await.unwrap_err();
        assert!(format!("{err}").contains("botToken"));
    }

    #[tokio::test]
    async fn test_missing_channel_fails_before_network() {
        let adapter = TelegramAdapter::new(
            TelegramCredentials {
                bot_token: "123:abc".to_string(),
                channel_id: String::new(),
            },
            Client::new(),
        );

        let err = adapter
            .publish(&PublishContent::text("hi", vec![]))
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("channelId"));
    }

    #[tokio::test]
    async fn test_engagement_is_unsupported() {
        let err = adapter("@launches")
            .fetch_engagement(Some("https://t.me/launches/42"))
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("Unsupported"));
    }
}
