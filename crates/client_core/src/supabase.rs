//! Collaborators backed by a hosted Supabase project: GoTrue for sign-in and
//! PostgREST for the project rows.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{NewProject, Project, Session, SessionUser},
    error::ApiException,
    protocol::AuthStateChange,
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{AuthSession, OrderBy, RemoteTable};

const AUTH_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project base url without a trailing slash.
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: SessionUser,
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiException::from_response(status.as_u16(), &body).into())
}

/// Password sign-in against `/auth/v1`. The session lives in memory only.
pub struct SupabaseAuth {
    http: Client,
    config: SupabaseConfig,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Arc<Self> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: SupabaseConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Arc::new(Self {
            http,
            config,
            session: RwLock::new(None),
            events,
        })
    }

    fn authorized(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
    }
}

#[async_trait]
impl AuthSession for SupabaseAuth {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http
            .post(self.config.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await?;
        let token: TokenResponse = ensure_success(response).await?.json().await?;

        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user,
        };
        *self.session.write().await = Some(session.clone());
        info!(user_id = %session.user.id, "auth: signed in");
        let _ = self.events.send(AuthStateChange::signed_in(session.clone()));
        Ok(session)
    }

    /// Forgets the local session and emits `SignedOut` even when the logout
    /// request fails; the failure is still reported.
    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            debug!("auth: sign out without a session");
            return Ok(());
        };

        let result = async {
            let response = self
                .authorized(
                    self.http.post(self.config.endpoint("/auth/v1/logout")),
                    &session.access_token,
                )
                .send()
                .await?;
            ensure_success(response).await.map(|_| ())
        }
        .await;

        info!(user_id = %session.user.id, "auth: signed out");
        let _ = self.events.send(AuthStateChange::signed_out());
        if let Err(err) = &result {
            warn!("auth: remote logout failed: {err:#}");
        }
        result
    }
}

/// One PostgREST table. Requests carry the signed-in user's token when there
/// is one and fall back to the anon key otherwise.
pub struct SupabaseTable {
    http: Client,
    config: SupabaseConfig,
    table: String,
    auth: Arc<dyn AuthSession>,
}

impl SupabaseTable {
    pub fn new(config: SupabaseConfig, table: impl Into<String>, auth: Arc<dyn AuthSession>) -> Self {
        Self::with_client(Client::new(), config, table, auth)
    }

    pub fn with_client(
        http: Client,
        config: SupabaseConfig,
        table: impl Into<String>,
        auth: Arc<dyn AuthSession>,
    ) -> Self {
        Self {
            http,
            config,
            table: table.into(),
            auth,
        }
    }

    fn rows_url(&self) -> String {
        self.config.endpoint(&format!("/rest/v1/{}", self.table))
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = match self.auth.current_session().await {
            Ok(Some(session)) => session.access_token,
            Ok(None) => self.config.anon_key.clone(),
            Err(err) => {
                warn!("rows: session lookup failed, using anon key: {err:#}");
                self.config.anon_key.clone()
            }
        };
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }
}

#[async_trait]
impl RemoteTable for SupabaseTable {
    async fn select_all(&self, order: &OrderBy) -> Result<Vec<Project>> {
        let direction = if order.descending { "desc" } else { "asc" };
        let order = format!("{}.{direction}", order.column);
        let response = self
            .authorized(self.http.get(self.rows_url()))
            .await
            .query(&[("select", "*"), ("order", order.as_str())])
            .send()
            .await
            .with_context(|| format!("failed to query table {}", self.table))?;
        let rows = ensure_success(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert_one(&self, project: &NewProject) -> Result<Project> {
        let response = self
            .authorized(self.http.post(self.rows_url()))
            .await
            .header("Prefer", "return=representation")
            .json(&[project])
            .send()
            .await
            .with_context(|| format!("failed to insert into table {}", self.table))?;
        let rows: Vec<Project> = ensure_success(response).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert into {} returned no rows", self.table))
    }
}

#[cfg(test)]
#[path = "tests/supabase_tests.rs"]
mod tests;
