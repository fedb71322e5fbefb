//! Connection management service

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::credentials::Credentials;
use crate::error::{OmnicastError, Result};
use crate::platforms::{AdapterFactory, TestOutcome};
use crate::store::ConnectionStore;
use crate::types::{SocialConnection, SocialPlatform, TestStatus};

/// Inbound upsert payload. Credentials arrive as a raw object and are
/// validated against the platform's shape at this boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpsert {
    #[serde(default)]
    pub id: Option<String>,
    pub platform: SocialPlatform,
    pub display_name: String,
    #[serde(default)]
    pub credentials: serde_json::Value,
}

#[derive(Clone)]
pub struct ConnectionService {
    store: ConnectionStore,
    adapters: Arc<dyn AdapterFactory>,
}

impl ConnectionService {
    pub fn new(store: ConnectionStore, adapters: Arc<dyn AdapterFactory>) -> Self {
        Self { store, adapters }
    }

    /// Masked connections for the tenant.
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<SocialConnection>> {
        self.store.list(tenant_id).await
    }

    /// Create or update a connection and return the merged record, masked.
    pub async fn upsert(
        &self,
        tenant_id: &str,
        identity: &str,
        input: ConnectionUpsert,
    ) -> Result<SocialConnection> {
        let credentials = Credentials::from_value(input.platform, input.credentials)
            .map_err(|e| OmnicastError::InvalidInput(format!("invalid credentials: {e}")))?;

        let id = input
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let connection = SocialConnection::new(id, input.display_name, credentials, identity);
        let merged = self.store.upsert(tenant_id, connection).await?;

        info!(
            tenant_id,
            connection_id = %merged.id,
            platform = %merged.platform,
            "connection upserted"
        );

        Ok(merged.masked())
    }

    /// Run the adapter's test call and persist the outcome either way.
    pub async fn test(&self, tenant_id: &str, connection_id: &str) -> Result<TestOutcome> {
        let connection = self.store.get(tenant_id, connection_id).await?;
        let adapter = self.adapters.adapter_for(&connection);

        match adapter.test().await {
            Ok(outcome) => {
                self.store
                    .record_test_result(tenant_id, connection_id, TestStatus::Ok, None)
                    .await?;
                Ok(outcome)
            }
            Err(error) => {
                self.store
                    .record_test_result(
                        tenant_id,
                        connection_id,
                        TestStatus::Error,
                        Some(error.to_string()),
                    )
                    .await?;
                Err(error)
            }
        }
    }

    pub async fn delete(&self, tenant_id: &str, connection_id: &str) -> Result<()> {
        self.store.delete(tenant_id, connection_id).await?;
        info!(tenant_id, connection_id, "connection deleted");
        Ok(())
    }
}
