use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{NewProject, Project, Session},
    protocol::{AuthStateChange, Route},
};
use tokio::sync::broadcast;

pub mod error;
mod in_flight;
mod login;
mod navigation;
mod projects;
mod session_gate;
pub mod supabase;

pub use error::ControllerError;
pub use login::{LoginForm, LoginSnapshot};
pub use navigation::RouteTracker;
pub use projects::{ProjectListController, ProjectListSnapshot};
pub use session_gate::{GatePhase, SessionGate, SessionView};

pub const CREATED_AT_COLUMN: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn newest_first() -> Self {
        Self {
            column: CREATED_AT_COLUMN.to_string(),
            descending: true,
        }
    }
}

/// Hosted row store for a single table.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    async fn select_all(&self, order: &OrderBy) -> Result<Vec<Project>>;
    /// Inserts one row; the store assigns `id` and `created_at`.
    async fn insert_one(&self, project: &NewProject) -> Result<Project>;
}

/// Identity provider. Dropping the receiver returned by `subscribe` stops delivery.
#[async_trait]
pub trait AuthSession: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>>;
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_out(&self) -> Result<()>;
}

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn go_to(&self, route: Route);
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
