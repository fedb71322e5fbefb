//! WhatsApp Cloud API adapter
//!
//! Sends published content as a Cloud API message from the tenant's business
//! number to a configured recipient. Message delivery has no public post URL
//! and the Cloud API exposes no engagement metrics.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::credentials::WhatsappCredentials;
use crate::error::{PlatformError, Result};
use crate::platforms::{
    compose_message, read_provider_error, require, PlatformAdapter, PublishContent,
    PublishOutcome, TestOutcome,
};
use crate::types::{EngagementMetrics, MediaType, SocialPlatform};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";
const TEXT_LIMIT: usize = 4096;
const CAPTION_LIMIT: usize = 1024;

#[derive(Debug, Deserialize)]
struct PhoneNumberInfo {
    display_phone_number: Option<String>,
    verified_name: Option<String>,
}

pub struct WhatsappAdapter {
    creds: WhatsappCredentials,
    http: Client,
    api_base: String,
}

impl WhatsappAdapter {
    pub fn new(creds: WhatsappCredentials, http: Client) -> Self {
        Self::with_api_base(creds, http, DEFAULT_API_BASE)
    }

    pub fn with_api_base(creds: WhatsappCredentials, http: Client, api_base: &str) -> Self {
        Self {
            creds,
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn message_payload(&self, content: &PublishContent) -> serde_json::Value {
        match (&content.media_url, content.media_type) {
            (Some(url), Some(MediaType::Video)) => serde_json::json!({
                "messaging_product": "whatsapp",
                "to": self.creds.recipient_phone,
                "type": "video",
                "video": {
                    "link": url,
                    "caption": compose_message(&content.caption, &content.hashtags, Some(CAPTION_LIMIT)),
                },
            }),
            (Some(url), _) => serde_json::json!({
                "messaging_product": "whatsapp",
                "to": self.creds.recipient_phone,
                "type": "image",
                "image": {
                    "link": url,
                    "caption": compose_message(&content.caption, &content.hashtags, Some(CAPTION_LIMIT)),
                },
            }),
            (None, _) => serde_json::json!({
                "messaging_product": "whatsapp",
                "to": self.creds.recipient_phone,
                "type": "text",
                "text": {
                    "body": compose_message(&content.caption, &content.hashtags, Some(TEXT_LIMIT)),
                },
            }),
        }
    }
}

#[async_trait]
impl PlatformAdapter for WhatsappAdapter {
    fn platform(&self) -> SocialPlatform {
        SocialPlatform::Whatsapp
    }

    async fn test(&self) -> Result<TestOutcome> {
        require("whatsapp", "accessToken", &self.creds.access_token)?;
        require("whatsapp", "phoneNumberId", &self.creds.phone_number_id)?;

        let context = "verify business number";
        let resp = self
            .http
            .get(format!(
                "{}/{}?fields=display_phone_number,verified_name",
                self.api_base, self.creds.phone_number_id
            ))
            .bearer_auth(&self.creds.access_token)
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }

        let info: PhoneNumberInfo = resp
            .json()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        let name = info.verified_name.unwrap_or_else(|| "unverified".to_string());
        let number = info
            .display_phone_number
            .unwrap_or_else(|| self.creds.phone_number_id.clone());
        Ok(TestOutcome {
            info: format!("WhatsApp business number {number} ({name})"),
        })
    }

    async fn publish(&self, content: &PublishContent) -> Result<PublishOutcome> {
        require("whatsapp", "accessToken", &self.creds.access_token)?;
        require("whatsapp", "phoneNumberId", &self.creds.phone_number_id)?;
        require("whatsapp", "recipientPhone", &self.creds.recipient_phone)?;

        let context = "send message";
        let resp = self
            .http
            .post(format!(
                "{}/{}/messages",
                self.api_base, self.creds.phone_number_id
            ))
            .bearer_auth(&self.creds.access_token)
            .json(&self.message_payload(content))
            .send()
            .await
            .map_err(|e| PlatformError::from_http(e, context))?;

        if !resp.status().is_success() {
            return Err(read_provider_error(resp, context).await.into());
        }

        // Message IDs are internal to the Cloud API; no public URL exists.
        Ok(PublishOutcome { post_url: None })
    }

    async fn fetch_engagement(&self, _post_url: Option<&str>) -> Result<EngagementMetrics> {
        Err(PlatformError::Unsupported(
            "The WhatsApp Cloud API does not expose engagement metrics for sent messages"
                .to_string(),
        )
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> WhatsappCredentials {
        WhatsappCredentials {
            access_token: "EAAB".to_string(),
            phone_number_id: "1055501234".to_string(),
            recipient_phone: "+15550001111".to_string(),
        }
    }

    #[test]
    fn test_text_payload_shape() {
        let adapter = WhatsappAdapter::new(creds(), Client::new());
        let payload = adapter.message_payload(&PublishContent::text(
            "Hello",
            vec!["launch".to_string()],
        ));

        assert_eq!(payload["messaging_product"], "whatsapp");
        assert_eq!(payload["to"], "+15550001111");
        assert_eq!(payload["type"], "text");
        assert_eq!(payload["text"]["body"], "Hello\n\n#launch");
    }

    #[test]
    fn test_image_payload_uses_caption() {
        let adapter = WhatsappAdapter::new(creds(), Client::new());
        let payload = adapter.message_payload(&PublishContent {
            caption: "Look".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/pic.jpg".to_string()),
            media_type: Some(MediaType::Image),
        });

        assert_eq!(payload["type"], "image");
        assert_eq!(payload["image"]["link"], "https://cdn.example.com/pic.jpg");
        assert_eq!(payload["image"]["caption"], "Look");
    }

    #[test]
    fn test_video_payload_shape() {
        let adapter = WhatsappAdapter::new(creds(), Client::new());
        let payload = adapter.message_payload(&PublishContent {
            caption: "Clip".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/clip.mp4".to_string()),
            media_type: Some(MediaType::Video),
        });

        assert_eq!(payload["type"], "video");
        assert_eq!(payload["video"]["link"], "https://cdn.example.com/clip.mp4");
    }

    #[tokio::test]
    async fn test_missing_recipient_fails_before_network() {
        let adapter = WhatsappAdapter::new(
            WhatsappCredentials {
                access_token: "tok".to_string(),
                phone_number_id: "1".to_string(),
                recipient_phone: String::new(),
            },
            Client::new(),
        );

        let err = adapter
            .publish(&PublishContent::text("hi", vec![]))
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("recipientPhone"));
    }

    #[tokio::test]
    async fn test_engagement_is_unsupported() {
        let adapter = WhatsappAdapter::new(creds(), Client::new());
        let err = adapter.fetch_engagement(None).await.unwrap_err();
        assert!(format!("{err}").contains("Unsupported"));
    }
}
