//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! The legacy-signed platform authenticates every call with a per-request
//! signature. The construction is exact and order-sensitive:
//!
//! 1. Collect the `oauth_*` protocol parameters plus every request parameter.
//! 2. Percent-encode keys and values with the RFC 3986 unreserved set
//!    (ALPHA / DIGIT / `-` / `.` / `_` / `~`), sort by encoded key (then
//!    value), and join as `k=v` pairs with `&`.
//! 3. Base string: `METHOD&encode(url)&encode(parameter_string)`.
//! 4. Signing key: `encode(api_secret)&encode(token_secret)`.
//! 5. Signature: base64 of HMAC-SHA1(base string, signing key).
//!
//! Given the same credentials, nonce, and timestamp, the output is
//! byte-identical to the provider's published reference example.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Everything except RFC 3986 unreserved characters gets encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode per RFC 3986 as OAuth 1.0a requires.
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Random alphanumeric nonce, fresh per request.
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Stateless signer holding one connection's OAuth 1.0a key material.
#[derive(Debug, Clone)]
pub struct Oauth1Signer {
    api_key: String,
    api_secret: String,
    access_token: String,
    access_token_secret: String,
}

impl Oauth1Signer {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// Build the `Authorization` header for a request, generating a fresh
    /// nonce and current timestamp.
    ///
    /// `request_params` are the query/form parameters that participate in
    /// the signature (JSON bodies do not).
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        request_params: &[(&str, &str)],
    ) -> String {
        let nonce = generate_nonce();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_at(method, url, request_params, &nonce, &timestamp)
    }

    /// Header construction with caller-supplied nonce and timestamp.
    /// Deterministic; this is the seam the signature tests go through.
    pub fn authorization_header_at(
        &self,
        method: &str,
        url: &str,
        request_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let signature = self.signature(method, url, request_params, nonce, timestamp);

        let mut header_params: Vec<(&str, String)> = vec![
            ("oauth_consumer_key", self.api_key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature", signature),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_token", self.access_token.clone()),
            ("oauth_version", "1.0".to_string()),
        ];
        header_params.sort_by(|a, b| a.0.cmp(b.0));

        let fields: Vec<String> = header_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();

        format!("OAuth {}", fields.join(", "))
    }

    /// Compute the base64-encoded HMAC-SHA1 signature.
    pub fn signature(
        &self,
        method: &str,
        url: &str,
        request_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let base = self.signature_base_string(method, url, request_params, nonce, timestamp);
        let key = format!(
            "{}&{}",
            percent_encode(&self.api_secret),
            percent_encode(&self.access_token_secret)
        );

        let mut mac =
            <HmacSha1 as Mac>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
        mac.update(base.as_bytes());

        BASE64.encode(mac.finalize().into_bytes())
    }

    fn signature_base_string(
        &self,
        method: &str,
        url: &str,
        request_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.api_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        for (k, v) in request_params {
            params.push((k.to_string(), v.to_string()));
        }

        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        )
    }
}
