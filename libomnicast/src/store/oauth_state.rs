//! Single-use OAuth state tokens

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use std::sync::Arc;

use super::oauth_state_key;
use crate::error::{OAuthError, Result, StoreError};
use crate::kv::KvStore;
use crate::types::{OAuthStatePayload, SocialPlatform};

/// States older than this are rejected at the callback even though they were
/// never consumed.
pub const STATE_TTL_MINUTES: i64 = 10;

const STATE_BYTES: usize = 32;

/// Issues and consumes the opaque state tokens that bind an authorization
/// redirect to its callback. A state is deleted the moment it is read back;
/// a second callback with the same state fails.
#[derive(Clone)]
pub struct OAuthStateStore {
    kv: Arc<dyn KvStore>,
}

impl OAuthStateStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Persist a fresh state payload and return its opaque key.
    pub async fn issue(
        &self,
        tenant_id: &str,
        platform: SocialPlatform,
        connection_id: &str,
    ) -> Result<String> {
        let mut bytes = [0u8; STATE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let state = URL_SAFE_NO_PAD.encode(bytes);

        let payload = OAuthStatePayload {
            tenant_id: tenant_id.to_string(),
            platform,
            connection_id: connection_id.to_string(),
            issued_at: Utc::now(),
        };
        let json = serde_json::to_string(&payload).map_err(StoreError::SerdeError)?;

        self.kv.put(&oauth_state_key(&state), &json).await?;
        Ok(state)
    }

    /// Read and delete a state in one step.
    ///
    /// Fails with an invalid-state error when the token is unknown, already
    /// consumed, or older than [`STATE_TTL_MINUTES`].
    pub async fn consume(&self, state: &str) -> Result<OAuthStatePayload> {
        let json = self
            .kv
            .take(&oauth_state_key(state))
            .await?
            .ok_or(OAuthError::InvalidState)?;

        let payload: OAuthStatePayload =
            serde_json::from_str(&json).map_err(StoreError::SerdeError)?;

        if Utc::now() - payload.issued_at > Duration::minutes(STATE_TTL_MINUTES) {
            return Err(OAuthError::InvalidState.into());
        }

        Ok(payload)
    }
}
