//! Fakes shared by the controller tests.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Session, SessionUser, UserId},
    protocol::{AuthStateChange, Route},
};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

use crate::{AuthSession, Navigator};

pub(crate) fn session_for(email: &str) -> Session {
    Session {
        access_token: format!("token-{email}"),
        refresh_token: None,
        user: SessionUser {
            id: UserId(format!("user-{email}")),
            email: Some(email.to_string()),
        },
    }
}

pub(crate) struct FakeAuth {
    pub session: Mutex<Option<Session>>,
    pub events: broadcast::Sender<AuthStateChange>,
    pub sign_in_error: Option<String>,
    pub sign_in_calls: Mutex<Vec<(String, String)>>,
    pub sign_out_calls: Mutex<u32>,
    /// When set, the next `sign_in` waits for this before answering.
    pub sign_in_hold: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeAuth {
    pub(crate) fn signed_out() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(None),
            events,
            sign_in_error: None,
            sign_in_calls: Mutex::new(Vec::new()),
            sign_out_calls: Mutex::new(0),
            sign_in_hold: Mutex::new(None),
        }
    }

    pub(crate) fn signed_in(email: &str) -> Self {
        let auth = Self::signed_out();
        *auth.session.try_lock().expect("unshared") = Some(session_for(email));
        auth
    }

    pub(crate) fn rejecting(message: &str) -> Self {
        let mut auth = Self::signed_out();
        auth.sign_in_error = Some(message.to_string());
        auth
    }

    /// Holds the next `sign_in` until the returned sender fires.
    pub(crate) fn hold_sign_in(&self) -> oneshot::Sender<()> {
        let (release, hold) = oneshot::channel();
        *self.sign_in_hold.try_lock().expect("unshared") = Some(hold);
        release
    }

    pub(crate) fn emit(&self, change: AuthStateChange) {
        let _ = self.events.send(change);
    }
}

#[async_trait]
impl AuthSession for FakeAuth {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.sign_in_calls
            .lock()
            .await
            .push((email.to_string(), password.to_string()));
        let hold = self.sign_in_hold.lock().await.take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        if let Some(message) = &self.sign_in_error {
            return Err(anyhow!(message.clone()));
        }
        let session = session_for(email);
        *self.session.lock().await = Some(session.clone());
        self.emit(AuthStateChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        *self.sign_out_calls.lock().await += 1;
        *self.session.lock().await = None;
        self.emit(AuthStateChange::signed_out());
        Ok(())
    }
}

/// Forwards every redirect to a channel the test can await.
pub(crate) struct RecordingNavigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl RecordingNavigator {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn go_to(&self, route: Route) {
        let _ = self.tx.send(route);
    }
}

/// Next redirect, or `None` if nothing arrives within a short window.
pub(crate) async fn next_route(rx: &mut mpsc::UnboundedReceiver<Route>) -> Option<Route> {
    tokio::time::timeout(Duration::from_millis(200), rx.recv())
        .await
        .ok()
        .flatten()
}

pub(crate) async fn no_route_within(rx: &mut mpsc::UnboundedReceiver<Route>) -> bool {
    !matches!(
        tokio::time::timeout(Duration::from_millis(50), rx.recv()).await,
        Ok(Some(_))
    )
}
