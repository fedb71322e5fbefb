//! Tenant analytics reconciliation
//!
//! Walks a tenant's published content cards, matches each to a platform
//! connection, pulls engagement counters through the platform adapter, and
//! merges the result back into the (external) content store. Individual
//! failures are collected per card; the batch always completes and reports a
//! mixed result.
//!
//! Cards are processed one at a time by default to bound third-party
//! rate-limit exposure. The limit is a parameter, not a hard-coded choice.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::platforms::AdapterFactory;
use crate::store::{ConnectionStore, PublishHistoryLog, SyncStatusStore};
use crate::types::{
    ContentCard, EngagementData, SocialConnection, SyncDetail, SyncReport, SyncStatus,
};

/// Source marker written into every engagement payload this engine produces.
const SYNC_SOURCE: &str = "api_sync";

/// External relational store owning the content cards.
///
/// The engine reads published cards and writes engagement data back; it
/// never changes card status or ownership.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Published cards for a tenant, optionally narrowed to specific IDs.
    async fn published_cards(
        &self,
        tenant_id: &str,
        card_ids: Option<&[String]>,
    ) -> Result<Vec<ContentCard>>;

    /// Persist updated engagement data for one card.
    async fn update_engagement(
        &self,
        tenant_id: &str,
        card_id: &str,
        data: &EngagementData,
    ) -> Result<()>;
}

pub struct AnalyticsSyncEngine {
    connections: ConnectionStore,
    history: PublishHistoryLog,
    status: SyncStatusStore,
    content: Arc<dyn ContentStore>,
    adapters: Arc<dyn AdapterFactory>,
    concurrency: usize,
}

impl AnalyticsSyncEngine {
    pub fn new(
        connections: ConnectionStore,
        history: PublishHistoryLog,
        status: SyncStatusStore,
        content: Arc<dyn ContentStore>,
        adapters: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            connections,
            history,
            status,
            content,
            adapters,
            concurrency: 1,
        }
    }

    /// Raise the per-tenant card-processing concurrency above the sequential
    /// default. Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reconcile engagement data for a tenant's published cards.
    ///
    /// A tenant with no connections short-circuits to a zero report without
    /// touching the content store.
    pub async fn sync_tenant(
        &self,
        tenant_id: &str,
        card_ids: Option<&[String]>,
    ) -> Result<SyncReport> {
        let connections = self.connections.all(tenant_id).await?;
        if connections.is_empty() {
            debug!(tenant_id, "no connections, skipping analytics sync");
            return Ok(SyncReport::default());
        }

        let cards = self.content.published_cards(tenant_id, card_ids).await?;
        let total_cards = cards.len() as u32;

        let details: Vec<SyncDetail> = stream::iter(cards)
            .map(|card| self.sync_card(tenant_id, &connections, card))
            .buffered(self.concurrency)
            .collect()
            .await;

        let synced = details.iter().filter(|d| d.ok).count() as u32;
        let errors = details.len() as u32 - synced;

        let report = SyncReport {
            synced,
            errors,
            details,
        };

        self.status
            .write(
                tenant_id,
                &SyncStatus {
                    last_sync_at: Utc::now(),
                    synced: report.synced,
                    errors: report.errors,
                    total_cards,
                },
            )
            .await?;

        Ok(report)
    }

    /// Last persisted sync summary, if any.
    pub async fn sync_status(&self, tenant_id: &str) -> Result<Option<SyncStatus>> {
        self.status.read(tenant_id).await
    }

    async fn sync_card(
        &self,
        tenant_id: &str,
        connections: &[SocialConnection],
        card: ContentCard,
    ) -> SyncDetail {
        match self.try_sync_card(tenant_id, connections, &card).await {
            Ok(()) => SyncDetail {
                card_id: card.id,
                card_title: card.title,
                ok: true,
                error: None,
            },
            Err(error) => {
                warn!(tenant_id, card_id = %card.id, %error, "card sync failed");
                SyncDetail {
                    card_id: card.id,
                    card_title: card.title,
                    ok: false,
                    error: Some(error),
                }
            }
        }
    }

    async fn try_sync_card(
        &self,
        tenant_id: &str,
        connections: &[SocialConnection],
        card: &ContentCard,
    ) -> std::result::Result<(), String> {
        let platform = card
            .platform
            .ok_or_else(|| "card has no target platform".to_string())?;

        let connection = connections
            .iter()
            .find(|c| c.platform == platform)
            .ok_or_else(|| format!("no {platform} connection configured"))?;

        let post_url = self
            .history
            .latest_success_for_platform(tenant_id, platform)
            .await
            .map_err(|e| e.to_string())?
            .and_then(|record| record.post_url);

        let adapter = self.adapters.adapter_for(connection);
        let metrics = adapter
            .fetch_engagement(post_url.as_deref())
            .await
            .map_err(|e| e.to_string())?;

        let data = EngagementData {
            metrics,
            updated_at: Utc::now(),
            source: SYNC_SOURCE.to_string(),
        };

        self.content
            .update_engagement(tenant_id, &card.id, &data)
            .await
            .map_err(|e| e.to_string())
    }
}
