//! Bounded per-tenant publish ledger

use std::sync::Arc;

use super::history_key;
use crate::error::{Result, StoreError};
use crate::kv::KvStore;
use crate::types::{PublishRecord, PublishStatus, SocialPlatform};

/// Maximum entries retained per tenant; older entries are dropped silently.
pub const HISTORY_CAP: usize = 100;

/// Append-only publish history, newest first.
#[derive(Clone)]
pub struct PublishHistoryLog {
    kv: Arc<dyn KvStore>,
}

impl PublishHistoryLog {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn load(&self, tenant_id: &str) -> Result<Vec<PublishRecord>> {
        match self.kv.get(&history_key(tenant_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json).map_err(StoreError::SerdeError)?),
            None => Ok(Vec::new()),
        }
    }

    /// Prepend a record, dropping anything past the cap.
    pub async fn append(&self, tenant_id: &str, record: PublishRecord) -> Result<()> {
        let mut records = self.load(tenant_id).await?;
        records.insert(0, record);
        records.truncate(HISTORY_CAP);

        let json = serde_json::to_string(&records).map_err(StoreError::SerdeError)?;
        self.kv.put(&history_key(tenant_id), &json).await
    }

    /// Newest-first slice of the ledger.
    pub async fn list(&self, tenant_id: &str, limit: Option<usize>) -> Result<Vec<PublishRecord>> {
        let mut records = self.load(tenant_id).await?;
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Most recent successful publish for a platform, if any.
    ///
    /// The sync engine uses this to recover the `postUrl` a card was
    /// published under.
    pub async fn latest_success_for_platform(
        &self,
        tenant_id: &str,
        platform: SocialPlatform,
    ) -> Result<Option<PublishRecord>> {
        Ok(self
            .load(tenant_id)
            .await?
            .into_iter()
            .find(|r| r.platform == platform && r.status == PublishStatus::Success))
    }
}
