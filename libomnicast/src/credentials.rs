//! Platform-tagged credential shapes and their secrecy rules
//!
//! Credentials are a closed union with one shape per platform, validated at
//! the store boundary. All fields are strings and an empty string means "not
//! provided" -- which is what makes the two invariants cheap to hold:
//!
//! - Masking: secret-classified fields are blanked on every read path that
//!   crosses the trust boundary.
//! - Merge-on-empty: an empty string submitted for a secret field on upsert
//!   means "keep the stored value", never "clear it". Non-secret fields
//!   (chat IDs, phone numbers, page IDs) overwrite unconditionally.

use serde::{Deserialize, Serialize};

use crate::types::SocialPlatform;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramCredentials {
    /// Secret. Issued by BotFather, grants full bot control.
    pub bot_token: String,
    /// Target chat: a numeric chat ID or a public `@channel` handle.
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhatsappCredentials {
    /// Secret. Cloud API bearer token.
    pub access_token: String,
    pub phone_number_id: String,
    /// Destination number for published messages, E.164.
    pub recipient_phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacebookCredentials {
    /// Secret. Page-scoped access token.
    pub page_access_token: String,
    pub page_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstagramCredentials {
    /// Secret. User access token with content-publish scope.
    pub access_token: String,
    pub instagram_user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XCredentials {
    /// Secret. OAuth 1.0a consumer key.
    pub api_key: String,
    /// Secret. OAuth 1.0a consumer secret.
    pub api_secret: String,
    /// Secret. OAuth 1.0a user token.
    pub access_token: String,
    /// Secret. OAuth 1.0a user token secret.
    pub access_token_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkedinCredentials {
    /// Secret. Member or organization bearer token.
    pub access_token: String,
    /// URN the post is authored as, e.g. `urn:li:person:...` or
    /// `urn:li:organization:...`.
    pub author_urn: String,
}

/// Credentials for one connection, tagged by platform.
///
/// Serializes as the bare credential object; the owning connection carries
/// the platform tag, and [`Credentials::from_value`] re-attaches the shape
/// on the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credentials {
    Telegram(TelegramCredentials),
    Whatsapp(WhatsappCredentials),
    Facebook(FacebookCredentials),
    Instagram(InstagramCredentials),
    X(XCredentials),
    Linkedin(LinkedinCredentials),
}

impl Credentials {
    /// Parse a raw credential object against the platform's shape.
    ///
    /// Unknown fields are ignored and missing fields default to the empty
    /// string, so partial submissions (e.g. an update that only touches the
    /// display name) parse cleanly and fall under the merge rules.
    pub fn from_value(
        platform: SocialPlatform,
        value: serde_json::Value,
    ) -> std::result::Result<Self, serde_json::Error> {
        let value = if value.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            value
        };

        Ok(match platform {
            SocialPlatform::Telegram => Credentials::Telegram(serde_json::from_value(value)?),
            SocialPlatform::Whatsapp => Credentials::Whatsapp(serde_json::from_value(value)?),
            SocialPlatform::Facebook => Credentials::Facebook(serde_json::from_value(value)?),
            SocialPlatform::Instagram => Credentials::Instagram(serde_json::from_value(value)?),
            SocialPlatform::X => Credentials::X(serde_json::from_value(value)?),
            SocialPlatform::Linkedin => Credentials::Linkedin(serde_json::from_value(value)?),
        })
    }

    /// Empty credentials of the platform's shape.
    pub fn empty(platform: SocialPlatform) -> Self {
        match platform {
            SocialPlatform::Telegram => Credentials::Telegram(TelegramCredentials::default()),
            SocialPlatform::Whatsapp => Credentials::Whatsapp(WhatsappCredentials::default()),
            SocialPlatform::Facebook => Credentials::Facebook(FacebookCredentials::default()),
            SocialPlatform::Instagram => Credentials::Instagram(InstagramCredentials::default()),
            SocialPlatform::X => Credentials::X(XCredentials::default()),
            SocialPlatform::Linkedin => Credentials::Linkedin(LinkedinCredentials::default()),
        }
    }

    pub fn platform(&self) -> SocialPlatform {
        match self {
            Credentials::Telegram(_) => SocialPlatform::Telegram,
            Credentials::Whatsapp(_) => SocialPlatform::Whatsapp,
            Credentials::Facebook(_) => SocialPlatform::Facebook,
            Credentials::Instagram(_) => SocialPlatform::Instagram,
            Credentials::X(_) => SocialPlatform::X,
            Credentials::Linkedin(_) => SocialPlatform::Linkedin,
        }
    }

    /// The secret-classified field names of this platform's shape, in wire
    /// casing. This is the masking/merge allow-list.
    pub fn secret_fields(&self) -> &'static [&'static str] {
        match self {
            Credentials::Telegram(_) => &["botToken"],
            Credentials::Whatsapp(_) => &["accessToken"],
            Credentials::Facebook(_) => &["pageAccessToken"],
            Credentials::Instagram(_) => &["accessToken"],
            Credentials::X(_) => &["apiKey", "apiSecret", "accessToken", "accessTokenSecret"],
            Credentials::Linkedin(_) => &["accessToken"],
        }
    }

    /// Copy with every secret-classified field replaced by the empty string.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        masked.for_each_secret(|slot| slot.clear());
        masked
    }

    /// Apply the merge-on-empty rule: any secret field submitted as the
    /// empty string is replaced by the stored value from `existing`.
    ///
    /// Merging only applies between credentials of the same platform; a
    /// platform change replaces the credentials wholesale.
    pub fn merge_missing_secrets(&mut self, existing: &Credentials) {
        macro_rules! merge {
            ($new:ident, $old:ident, [$($field:ident),+]) => {
                $(
                    if $new.$field.is_empty() {
                        $new.$field = $old.$field.clone();
                    }
                )+
            };
        }

        match (self, existing) {
            (Credentials::Telegram(new), Credentials::Telegram(old)) => {
                merge!(new, old, [bot_token]);
            }
            (Credentials::Whatsapp(new), Credentials::Whatsapp(old)) => {
                merge!(new, old, [access_token]);
            }
            (Credentials::Facebook(new), Credentials::Facebook(old)) => {
                merge!(new, old, [page_access_token]);
            }
            (Credentials::Instagram(new), Credentials::Instagram(old)) => {
                merge!(new, old, [access_token]);
            }
            (Credentials::X(new), Credentials::X(old)) => {
                merge!(
                    new,
                    old,
                    [api_key, api_secret, access_token, access_token_secret]
                );
            }
            (Credentials::Linkedin(new), Credentials::Linkedin(old)) => {
                merge!(new, old, [access_token]);
            }
            _ => {}
        }
    }

    /// True when every secret-classified field is empty.
    pub fn secrets_blank(&self) -> bool {
        let mut blank = true;
        let mut probe = self.clone();
        probe.for_each_secret(|slot| {
            if !slot.is_empty() {
                blank = false;
            }
        });
        blank
    }

    fn for_each_secret(&mut self, mut f: impl FnMut(&mut String)) {
        match self {
            Credentials::Telegram(c) => f(&mut c.bot_token),
            Credentials::Whatsapp(c) => f(&mut c.access_token),
            Credentials::Facebook(c) => f(&mut c.page_access_token),
            Credentials::Instagram(c) => f(&mut c.access_token),
            Credentials::X(c) => {
                f(&mut c.api_key);
                f(&mut c.api_secret);
                f(&mut c.access_token);
                f(&mut c.access_token_secret);
            }
            Credentials::Linkedin(c) => f(&mut c.access_token),
        }
    }
}
