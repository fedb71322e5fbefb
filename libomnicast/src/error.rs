//! Error types for Omnicast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OmnicastError>;

#[derive(Error, Debug)]
pub enum OmnicastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Failed to encode record: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Failures surfaced by platform adapters.
///
/// Adapters never let a provider error escape unstructured: every network
/// call is wrapped and mapped into one of these variants, and the adapter
/// boundary never panics.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// A required credential field is absent. Raised before any network call.
    #[error("{platform} connection is missing required credential '{field}'")]
    MissingCredential {
        platform: &'static str,
        field: &'static str,
    },

    /// The provider returned a non-2xx status or an error payload. The
    /// provider's own message is passed through verbatim.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The request content cannot be published on this platform. Raised
    /// before any network call.
    #[error("{0}")]
    InvalidContent(String),

    /// Asynchronous media processing failed or never reached a terminal state.
    #[error("Media processing failed: {0}")]
    MediaProcessing(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The platform's public API has no surface for the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl PlatformError {
    pub fn missing(platform: &'static str, field: &'static str) -> Self {
        PlatformError::MissingCredential { platform, field }
    }

    /// Map a reqwest failure into the adapter taxonomy.
    pub fn from_http(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() {
            PlatformError::Timeout(format!("{context}: {err}"))
        } else if err.is_decode() {
            PlatformError::Provider(format!("{context}: unexpected response format: {err}"))
        } else {
            PlatformError::Network(format!("{context}: {err}"))
        }
    }
}

#[derive(Error, Debug)]
pub enum OAuthError {
    /// The state token is missing, unknown, already consumed, or stale.
    #[error("Invalid or expired OAuth state")]
    InvalidState,

    /// The provider rejected the authorization-code or token exchange.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("Platform does not support OAuth connection: {0}")]
    Unsupported(String),
}
