//! Tenant-scope authentication seam
//!
//! The full identity/authorization module is an external collaborator; this
//! file carries its contract (tenant-scope check, rate limiting, audit
//! append) and a static API-key implementation good for a single-instance
//! deployment. Both the key table and the rate buckets are process-local
//! state, injected explicitly rather than hidden in module globals; a
//! multi-instance deployment replaces them with a shared backing store.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use libomnicast::audit::{AuditLog, SecurityEvent};

/// Authenticated caller, scoped to one tenant.
#[derive(Debug, Clone)]
pub struct Identity {
    pub tenant_id: String,
    pub subject: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("API key is not valid for tenant {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),
}

/// Contract the HTTP layer authenticates against.
pub trait TenantAuth: Send + Sync {
    /// Verify the request may act on `tenant_id`. Runs before any adapter
    /// or store access; failures short-circuit the route.
    fn require_tenant_scope(
        &self,
        headers: &HeaderMap,
        tenant_id: &str,
    ) -> Result<Identity, AuthError>;

    /// Count a request against a bucket; deny when the window is full.
    fn rate_limit(
        &self,
        identity: &Identity,
        bucket: &str,
        max: usize,
        window: Duration,
    ) -> Result<(), AuthError>;
}

/// Sliding-window request counter keyed by bucket string.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit and report whether it stayed under the limit.
    pub fn check_and_record(&self, key: &str, max: usize, window: Duration) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let hits = buckets.entry(key.to_string()).or_default();

        hits.retain(|t| now.duration_since(*t) < window);
        if hits.len() >= max {
            return false;
        }
        hits.push(now);
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Static API-key authentication: one key per tenant, from configuration.
pub struct ApiKeyAuth {
    /// tenant id -> API key
    api_keys: HashMap<String, String>,
    limiter: RateLimiter,
    audit: AuditLog,
}

impl ApiKeyAuth {
    pub fn new(api_keys: HashMap<String, String>, audit: AuditLog) -> Self {
        Self {
            api_keys,
            limiter: RateLimiter::new(),
            audit,
        }
    }

    fn presented_key(headers: &HeaderMap) -> Option<String> {
        if let Some(value) = headers.get("authorization") {
            let value = value.to_str().ok()?;
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
        headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    }
}

impl TenantAuth for ApiKeyAuth {
    fn require_tenant_scope(
        &self,
        headers: &HeaderMap,
        tenant_id: &str,
    ) -> Result<Identity, AuthError> {
        let presented = Self::presented_key(headers).ok_or_else(|| {
            self.audit.record(
                SecurityEvent::new("tenant_scope", "denied")
                    .tenant(tenant_id)
                    .detail("no API key presented"),
            );
            AuthError::Unauthorized
        })?;

        let expected = self.api_keys.get(tenant_id).ok_or_else(|| {
            self.audit.record(
                SecurityEvent::new("tenant_scope", "denied")
                    .tenant(tenant_id)
                    .detail("unknown tenant"),
            );
            AuthError::Forbidden(tenant_id.to_string())
        })?;

        if &presented != expected {
            self.audit.record(
                SecurityEvent::new("tenant_scope", "denied")
                    .tenant(tenant_id)
                    .detail("key mismatch"),
            );
            return Err(AuthError::Forbidden(tenant_id.to_string()));
        }

        Ok(Identity {
            tenant_id: tenant_id.to_string(),
            subject: format!("{tenant_id}:api-key"),
        })
    }

    fn rate_limit(
        &self,
        identity: &Identity,
        bucket: &str,
        max: usize,
        window: Duration,
    ) -> Result<(), AuthError> {
        let key = format!("{bucket}:{}", identity.tenant_id);
        if self.limiter.check_and_record(&key, max, window) {
            Ok(())
        } else {
            self.audit.record(
                SecurityEvent::new("rate_limit", "denied")
                    .tenant(&identity.tenant_id)
                    .actor(&identity.subject)
                    .detail(bucket.to_string()),
            );
            Err(AuthError::RateLimited(bucket.to_string()))
        }
    }
}
