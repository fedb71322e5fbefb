//! Publishing service
//!
//! Resolves the target connection, dispatches the adapter, and appends the
//! outcome to the tenant's publish ledger. The ledger entry is written
//! strictly after the provider call resolves, success or failure, so history
//! order follows completion order. There is no retry: at most one provider
//! attempt per request, by contract.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{OmnicastError, Result};
use crate::platforms::{AdapterFactory, PublishContent};
use crate::store::{ConnectionStore, PublishHistoryLog};
use crate::types::{MediaType, PublishRecord};

/// Inbound publish payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub connection_id: String,
    #[serde(default)]
    pub card_title: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
}

#[derive(Clone)]
pub struct PublishService {
    store: ConnectionStore,
    history: PublishHistoryLog,
    adapters: Arc<dyn AdapterFactory>,
}

impl PublishService {
    pub fn new(
        store: ConnectionStore,
        history: PublishHistoryLog,
        adapters: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            store,
            history,
            adapters,
        }
    }

    /// Publish through one connection and record the attempt.
    ///
    /// The returned record carries the outcome either way; an `Err` here
    /// means the connection could not be resolved or the store failed, not
    /// that the provider rejected the post.
    pub async fn publish(
        &self,
        tenant_id: &str,
        identity: &str,
        request: PublishRequest,
    ) -> Result<PublishRecord> {
        let connection = self.store.get(tenant_id, &request.connection_id).await?;
        let adapter = self.adapters.adapter_for(&connection);

        let content = PublishContent {
            caption: request.caption,
            hashtags: request.hashtags,
            media_url: request.media_url,
            media_type: request.media_type,
        };

        let record = match adapter.publish(&content).await {
            Ok(outcome) => {
                info!(
                    tenant_id,
                    connection_id = %connection.id,
                    platform = %connection.platform,
                    "publish succeeded"
                );
                PublishRecord::success(
                    request.card_title,
                    connection.platform,
                    connection.display_name.clone(),
                    identity,
                    outcome.post_url,
                )
            }
            Err(OmnicastError::Platform(error)) => {
                warn!(
                    tenant_id,
                    connection_id = %connection.id,
                    platform = %connection.platform,
                    %error,
                    "publish failed"
                );
                PublishRecord::failure(
                    request.card_title,
                    connection.platform,
                    connection.display_name.clone(),
                    identity,
                    error.to_string(),
                )
            }
            Err(other) => return Err(other),
        };

        if let Err(error) = self.history.append(tenant_id, record.clone()).await {
            warn!(tenant_id, %error, "failed to record publish history entry");
        }

        Ok(record)
    }

    /// Newest-first slice of the tenant's publish ledger.
    pub async fn history(
        &self,
        tenant_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PublishRecord>> {
        self.history.list(tenant_id, limit).await
    }
}
