//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use libomnicast::audit::AuditLog;
use libomnicast::error::{Result as CoreResult, StoreError};
use libomnicast::kv::{KvStore, SqliteKv};
use libomnicast::oauth::{OAuthApps, OAuthCoordinator};
use libomnicast::platforms::{AdapterFactory, HttpAdapterFactory};
use libomnicast::service::{ConnectionService, PublishService};
use libomnicast::store::{ConnectionStore, OAuthStateStore, PublishHistoryLog, SyncStatusStore};
use libomnicast::sync::{AnalyticsSyncEngine, ContentStore};
use libomnicast::types::{ContentCard, EngagementData};
use libomnicast::Config;

use crate::auth::{ApiKeyAuth, TenantAuth};

/// State handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub connections: ConnectionService,
    pub publisher: PublishService,
    pub sync: Arc<AnalyticsSyncEngine>,
    pub oauth: Arc<OAuthCoordinator>,
    pub auth: Arc<dyn TenantAuth>,
    pub audit: AuditLog,
    pub public_url: String,
}

impl AppState {
    /// Wire the full production state from configuration.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(SqliteKv::connect(&config.database.path).await?);
        let (audit, _audit_task) = AuditLog::start(1024, Duration::from_secs(5));

        let auth: Arc<dyn TenantAuth> = Arc::new(ApiKeyAuth::new(
            config.auth.api_keys.clone(),
            audit.clone(),
        ));

        let adapters: Arc<dyn AdapterFactory> = Arc::new(HttpAdapterFactory::with_timeout(
            Duration::from_secs(config.http.timeout_secs),
        ));

        let content: Arc<dyn ContentStore> = Arc::new(KvContentStore::new(kv.clone()));

        Ok(Self::assemble(
            kv,
            adapters,
            auth,
            audit,
            content,
            config.oauth.clone(),
            config.server.public_url.clone(),
            config.sync.concurrency,
        ))
    }

    /// Assemble state from parts. Tests inject in-memory stores and mock
    /// adapter factories through this.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        kv: Arc<dyn KvStore>,
        adapters: Arc<dyn AdapterFactory>,
        auth: Arc<dyn TenantAuth>,
        audit: AuditLog,
        content: Arc<dyn ContentStore>,
        oauth_apps: OAuthApps,
        public_url: String,
        sync_concurrency: usize,
    ) -> Self {
        let connection_store = ConnectionStore::new(kv.clone());
        let history = PublishHistoryLog::new(kv.clone());
        let states = OAuthStateStore::new(kv.clone());
        let sync_status = SyncStatusStore::new(kv);

        let connections = ConnectionService::new(connection_store.clone(), adapters.clone());
        let publisher =
            PublishService::new(connection_store.clone(), history.clone(), adapters.clone());

        let sync = Arc::new(
            AnalyticsSyncEngine::new(
                connection_store.clone(),
                history,
                sync_status,
                content,
                adapters,
            )
            .with_concurrency(sync_concurrency),
        );

        let http = reqwest_client();
        let oauth = Arc::new(OAuthCoordinator::new(
            oauth_apps,
            connection_store,
            states,
            http,
        ));

        Self {
            connections,
            publisher,
            sync,
            oauth,
            auth,
            audit,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Redirect URI the OAuth flow hands to the provider.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/social/oauth/callback", self.public_url)
    }
}

fn reqwest_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Content store stand-in over the shared key/value backend.
///
/// The relational card store is owned by another service; until it is wired
/// in, cards live as JSON arrays under `content_cards:{tenantId}` with the
/// same tenant isolation. Only `engagement_data` is ever written back.
pub struct KvContentStore {
    kv: Arc<dyn KvStore>,
}

impl KvContentStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn key(tenant_id: &str) -> String {
        format!("content_cards:{tenant_id}")
    }

    async fn load(&self, tenant_id: &str) -> CoreResult<Vec<ContentCard>> {
        match self.kv.get(&Self::key(tenant_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json).map_err(StoreError::SerdeError)?),
            None => Ok(Vec::new()),
        }
    }

    /// Seed helper used by tests and local experiments.
    pub async fn put_cards(&self, tenant_id: &str, cards: &[ContentCard]) -> CoreResult<()> {
        let json = serde_json::to_string(cards).map_err(StoreError::SerdeError)?;
        self.kv.put(&Self::key(tenant_id), &json).await
    }
}

#[async_trait]
impl ContentStore for KvContentStore {
    async fn published_cards(
        &self,
        tenant_id: &str,
        card_ids: Option<&[String]>,
    ) -> CoreResult<Vec<ContentCard>> {
        let cards = self.load(tenant_id).await?;
        Ok(cards
            .into_iter()
            .filter(|c| c.status == "published")
            .filter(|c| card_ids.map_or(true, |ids| ids.contains(&c.id)))
            .collect())
    }

    async fn update_engagement(
        &self,
        tenant_id: &str,
        card_id: &str,
        data: &EngagementData,
    ) -> CoreResult<()> {
        let mut cards = self.load(tenant_id).await?;

        let card = cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or_else(|| StoreError::NotFound(format!("content card {card_id}")))?;
        card.engagement_data = Some(data.clone());

        let json = serde_json::to_string(&cards).map_err(StoreError::SerdeError)?;
        self.kv.put(&Self::key(tenant_id), &json).await
    }
}
