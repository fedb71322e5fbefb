//! Per-tenant connection persistence with secret masking and merge rules

use chrono::Utc;
use std::sync::Arc;

use super::connections_key;
use crate::error::{Result, StoreError};
use crate::kv::KvStore;
use crate::types::{SocialConnection, TestStatus};

/// Store for a tenant's platform connections.
///
/// Two read paths with different trust levels: [`ConnectionStore::list`]
/// masks every secret-classified credential field and is the only read meant
/// to cross the trust boundary; [`ConnectionStore::get`] returns the full
/// record and feeds adapters, the OAuth coordinator, and the sync engine.
#[derive(Clone)]
pub struct ConnectionStore {
    kv: Arc<dyn KvStore>,
}

impl ConnectionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    async fn load(&self, tenant_id: &str) -> Result<Vec<SocialConnection>> {
        match self.kv.get(&connections_key(tenant_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json).map_err(StoreError::SerdeError)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, tenant_id: &str, connections: &[SocialConnection]) -> Result<()> {
        let json = serde_json::to_string(connections).map_err(StoreError::SerdeError)?;
        self.kv.put(&connections_key(tenant_id), &json).await
    }

    /// All connections with secrets masked. Safe to return to a client.
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<SocialConnection>> {
        Ok(self
            .load(tenant_id)
            .await?
            .iter()
            .map(SocialConnection::masked)
            .collect())
    }

    /// All connections with full credentials. Internal use only; feeds the
    /// adapters and the sync engine's platform matching.
    pub async fn all(&self, tenant_id: &str) -> Result<Vec<SocialConnection>> {
        self.load(tenant_id).await
    }

    /// One connection with full credentials. Internal use only.
    pub async fn get(&self, tenant_id: &str, connection_id: &str) -> Result<SocialConnection> {
        self.load(tenant_id)
            .await?
            .into_iter()
            .find(|c| c.id == connection_id)
            .ok_or_else(|| StoreError::NotFound(format!("connection {connection_id}")).into())
    }

    /// Insert or update a connection.
    ///
    /// For an existing record, secret fields submitted empty keep their
    /// stored value and `connectedAt`/`connectedBy` are preserved; everything
    /// else overwrites. Returns the merged record as persisted -- this is
    /// what `test` and `publish` subsequently operate on.
    pub async fn upsert(
        &self,
        tenant_id: &str,
        mut incoming: SocialConnection,
    ) -> Result<SocialConnection> {
        let mut connections = self.load(tenant_id).await?;

        match connections.iter().position(|c| c.id == incoming.id) {
            Some(index) => {
                let existing = &connections[index];
                incoming
                    .credentials
                    .merge_missing_secrets(&existing.credentials);
                incoming.connected_at = existing.connected_at;
                if incoming.connected_by.is_empty() {
                    incoming.connected_by = existing.connected_by.clone();
                }
                if incoming.last_test_status.is_none() {
                    incoming.last_tested_at = existing.last_tested_at;
                    incoming.last_test_status = existing.last_test_status;
                    incoming.last_test_error = existing.last_test_error.clone();
                }
                connections[index] = incoming.clone();
            }
            None => connections.push(incoming.clone()),
        }

        self.save(tenant_id, &connections).await?;
        Ok(incoming)
    }

    /// Remove a connection. Removing an unknown ID is not an error.
    pub async fn delete(&self, tenant_id: &str, connection_id: &str) -> Result<()> {
        let mut connections = self.load(tenant_id).await?;
        connections.retain(|c| c.id != connection_id);
        self.save(tenant_id, &connections).await
    }

    /// Persist the outcome of a connection test.
    pub async fn record_test_result(
        &self,
        tenant_id: &str,
        connection_id: &str,
        status: TestStatus,
        error: Option<String>,
    ) -> Result<()> {
        let mut connections = self.load(tenant_id).await?;

        let conn = connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or_else(|| StoreError::NotFound(format!("connection {connection_id}")))?;

        conn.last_tested_at = Some(Utc::now());
        conn.last_test_status = Some(status);
        conn.last_test_error = error;

        self.save(tenant_id, &connections).await
    }
}
