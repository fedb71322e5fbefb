//! Engine state stores over the key/value backend
//!
//! Key patterns are part of the deployment contract (other services read the
//! same store):
//!
//! - `social_connections:{tenantId}` -- connection list, JSON array
//! - `social_history:{tenantId}` -- publish ledger, JSON array, capped
//! - `oauth_state:{state}` -- one single-use OAuth state payload
//! - `analytics_sync_status:{tenantId}` -- latest sync summary
//!
//! Writes to a tenant's connection list are read-modify-write without an
//! optimistic-concurrency token; concurrent upserts for the same tenant can
//! lose one of the writes. Known limitation of the store contract.

mod connections;
mod history;
mod oauth_state;

pub use connections::ConnectionStore;
pub use history::{PublishHistoryLog, HISTORY_CAP};
pub use oauth_state::{OAuthStateStore, STATE_TTL_MINUTES};

use std::sync::Arc;

use crate::error::Result;
use crate::kv::KvStore;
use crate::types::SyncStatus;

pub(crate) fn connections_key(tenant_id: &str) -> String {
    format!("social_connections:{tenant_id}")
}

pub(crate) fn history_key(tenant_id: &str) -> String {
    format!("social_history:{tenant_id}")
}

pub(crate) fn oauth_state_key(state: &str) -> String {
    format!("oauth_state:{state}")
}

pub(crate) fn sync_status_key(tenant_id: &str) -> String {
    format!("analytics_sync_status:{tenant_id}")
}

/// Latest analytics sync summary, overwrite-latest semantics.
#[derive(Clone)]
pub struct SyncStatusStore {
    kv: Arc<dyn KvStore>,
}

impl SyncStatusStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn write(&self, tenant_id: &str, status: &SyncStatus) -> Result<()> {
        let json = serde_json::to_string(status).map_err(crate::error::StoreError::SerdeError)?;
        self.kv.put(&sync_status_key(tenant_id), &json).await
    }

    pub async fn read(&self, tenant_id: &str) -> Result<Option<SyncStatus>> {
        match self.kv.get(&sync_status_key(tenant_id)).await? {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).map_err(crate::error::StoreError::SerdeError)?,
            )),
            None => Ok(None),
        }
    }
}
