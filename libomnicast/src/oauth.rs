//! OAuth connection flow for the graph-style platforms
//!
//! Two of the six platforms (Facebook and Instagram) can establish a
//! connection through the provider's authorization-code flow instead of
//! manual credential entry. The coordinator owns both legs:
//!
//! - `start` builds the authorization URL and persists a single-use state
//!   token binding the redirect to its tenant.
//! - `callback` consumes the state, exchanges the code for a token, upgrades
//!   it to a long-lived token, resolves the connected identity (managed page
//!   or linked business account), and upserts the connection.
//!
//! Trust on the callback leg is carried entirely by the state token; the
//! route itself is an unauthenticated browser redirect.

use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::credentials::{Credentials, FacebookCredentials, InstagramCredentials};
use crate::error::{OAuthError, Result};
use crate::platforms::read_provider_error;
use crate::store::{ConnectionStore, OAuthStateStore};
use crate::types::{SocialConnection, SocialPlatform, TestStatus};

const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const DEFAULT_DIALOG_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";

const FACEBOOK_SCOPES: &str = "pages_show_list,pages_manage_posts,pages_read_engagement";
const INSTAGRAM_SCOPES: &str = "instagram_basic,instagram_content_publish,pages_show_list";

/// App credentials registered with the provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OAuthApp {
    pub app_id: String,
    pub app_secret: String,
}

/// Configured OAuth apps, one per OAuth-capable platform.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OAuthApps {
    pub facebook: Option<OAuthApp>,
    pub instagram: Option<OAuthApp>,
}

impl OAuthApps {
    fn for_platform(&self, platform: SocialPlatform) -> Result<&OAuthApp> {
        let app = match platform {
            SocialPlatform::Facebook => self.facebook.as_ref(),
            SocialPlatform::Instagram => self.instagram.as_ref(),
            _ => None,
        };
        app.ok_or_else(|| {
            OAuthError::Unsupported(format!("no OAuth app configured for {platform}")).into()
        })
    }
}

/// Result of starting an OAuth flow.
#[derive(Debug, Clone)]
pub struct StartedFlow {
    pub authorize_url: String,
    pub state: String,
    pub connection_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PageList {
    data: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    name: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageIgLink {
    instagram_business_account: Option<IgAccount>,
}

#[derive(Debug, Deserialize)]
struct IgAccount {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IgProfile {
    username: Option<String>,
}

pub struct OAuthCoordinator {
    apps: OAuthApps,
    connections: ConnectionStore,
    states: OAuthStateStore,
    http: Client,
    graph_base: String,
    dialog_url: String,
}

impl OAuthCoordinator {
    pub fn new(
        apps: OAuthApps,
        connections: ConnectionStore,
        states: OAuthStateStore,
        http: Client,
    ) -> Self {
        Self {
            apps,
            connections,
            states,
            http,
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
            dialog_url: DEFAULT_DIALOG_URL.to_string(),
        }
    }

    /// Override provider endpoints. Tests point these at a mock server.
    pub fn with_endpoints(mut self, graph_base: &str, dialog_url: &str) -> Self {
        self.graph_base = graph_base.trim_end_matches('/').to_string();
        self.dialog_url = dialog_url.to_string();
        self
    }

    /// Build the authorization URL and persist a single-use state for it.
    pub async fn start(
        &self,
        tenant_id: &str,
        platform: SocialPlatform,
        redirect_uri: &str,
        connection_id: Option<String>,
    ) -> Result<StartedFlow> {
        if !platform.supports_oauth() {
            return Err(OAuthError::Unsupported(format!(
                "{platform} connections are configured with manual credentials"
            ))
            .into());
        }
        let app = self.apps.for_platform(platform)?;

        let connection_id = connection_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let state = self
            .states
            .issue(tenant_id, platform, &connection_id)
            .await?;

        let scopes = match platform {
            SocialPlatform::Instagram => INSTAGRAM_SCOPES,
            _ => FACEBOOK_SCOPES,
        };

        let authorize_url = format!(
            "{}?client_id={}&redirect_uri={}&state={}&scope={}&response_type=code",
            self.dialog_url,
            urlencoding::encode(&app.app_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&state),
            urlencoding::encode(scopes),
        );

        Ok(StartedFlow {
            authorize_url,
            state,
            connection_id,
        })
    }

    /// Finalize the flow: consume the state, exchange tokens, resolve the
    /// account, and persist the connection.
    pub async fn callback(
        &self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<SocialConnection> {
        let payload = self.states.consume(state).await?;
        let app = self.apps.for_platform(payload.platform)?;

        let short_lived = self.exchange_code(app, code, redirect_uri).await?;
        let user_token = self.exchange_long_lived(app, &short_lived).await?;

        let (display_name, credentials) = match payload.platform {
            SocialPlatform::Instagram => self.resolve_instagram(&user_token).await?,
            _ => self.resolve_facebook(&user_token).await?,
        };

        let mut connection = SocialConnection::new(
            payload.connection_id.clone(),
            display_name,
            credentials,
            "oauth",
        );
        connection.last_tested_at = Some(chrono::Utc::now());
        connection.last_test_status = Some(TestStatus::Ok);

        self.connections.upsert(&payload.tenant_id, connection).await
    }

    async fn exchange_code(
        &self,
        app: &OAuthApp,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/oauth/access_token", self.graph_base))
            .query(&[
                ("client_id", app.app_id.as_str()),
                ("client_secret", app.app_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(format!("code exchange: {e}")))?;

        if !resp.status().is_success() {
            return Err(self.exchange_error(resp, "code exchange").await.into());
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(format!("code exchange: {e}")))?;
        Ok(token.access_token)
    }

    async fn exchange_long_lived(&self, app: &OAuthApp, token: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/oauth/access_token", self.graph_base))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", app.app_id.as_str()),
                ("client_secret", app.app_secret.as_str()),
                ("fb_exchange_token", token),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(format!("long-lived exchange: {e}")))?;

        if !resp.status().is_success() {
            return Err(self
                .exchange_error(resp, "long-lived exchange")
                .await
                .into());
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(format!("long-lived exchange: {e}")))?;
        Ok(token.access_token)
    }

    async fn managed_pages(&self, user_token: &str) -> Result<Vec<Page>> {
        let resp = self
            .http
            .get(format!("{}/me/accounts", self.graph_base))
            .query(&[("access_token", user_token)])
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(format!("list managed pages: {e}")))?;

        if !resp.status().is_success() {
            return Err(self
                .exchange_error(resp, "list managed pages")
                .await
                .into());
        }

        let pages: PageList = resp
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(format!("list managed pages: {e}")))?;
        Ok(pages.data)
    }

    async fn resolve_facebook(&self, user_token: &str) -> Result<(String, Credentials)> {
        let pages = self.managed_pages(user_token).await?;
        let page = pages.into_iter().next().ok_or_else(|| {
            OAuthError::Exchange("the authorized account manages no pages".to_string())
        })?;

        let page_token = page.access_token.ok_or_else(|| {
            OAuthError::Exchange("provider returned a page without an access token".to_string())
        })?;

        let name = page.name.unwrap_or_else(|| format!("Page {}", page.id));
        Ok((
            name,
            Credentials::Facebook(FacebookCredentials {
                page_access_token: page_token,
                page_id: page.id,
            }),
        ))
    }

    async fn resolve_instagram(&self, user_token: &str) -> Result<(String, Credentials)> {
        let pages = self.managed_pages(user_token).await?;
        let page = pages.into_iter().next().ok_or_else(|| {
            OAuthError::Exchange("the authorized account manages no pages".to_string())
        })?;

        let resp = self
            .http
            .get(format!("{}/{}", self.graph_base, page.id))
            .query(&[
                ("fields", "instagram_business_account"),
                ("access_token", user_token),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(format!("resolve business account: {e}")))?;

        if !resp.status().is_success() {
            return Err(self
                .exchange_error(resp, "resolve business account")
                .await
                .into());
        }

        let link: PageIgLink = resp
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(format!("resolve business account: {e}")))?;

        let account = link.instagram_business_account.ok_or_else(|| {
            OAuthError::Exchange(
                "the authorized page has no linked Instagram business account".to_string(),
            )
        })?;

        let username = self.instagram_username(&account.id, user_token).await;
        let display_name =
            username.unwrap_or_else(|| format!("Instagram account {}", account.id));

        Ok((
            display_name,
            Credentials::Instagram(InstagramCredentials {
                access_token: user_token.to_string(),
                instagram_user_id: account.id,
            }),
        ))
    }

    /// Best-effort; a failed lookup only costs the display name.
    async fn instagram_username(&self, account_id: &str, user_token: &str) -> Option<String> {
        let resp = self
            .http
            .get(format!("{}/{}", self.graph_base, account_id))
            .query(&[("fields", "username"), ("access_token", user_token)])
            .send()
            .await
            .ok()?;

        if !resp.status().is_success() {
            return None;
        }

        resp.json::<IgProfile>()
            .await
            .ok()?
            .username
            .map(|u| format!("@{u}"))
    }

    async fn exchange_error(&self, resp: reqwest::Response, context: &str) -> OAuthError {
        let platform_error = read_provider_error(resp, context).await;
        OAuthError::Exchange(platform_error.to_string())
    }
}
