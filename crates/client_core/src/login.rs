use std::sync::Arc;

use shared::protocol::Route;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{error::ControllerError, in_flight::InFlight, AuthSession, Navigator};

/// Email/password sign-in form.
pub struct LoginForm {
    auth: Arc<dyn AuthSession>,
    navigator: Arc<dyn Navigator>,
    in_flight: InFlight,
    inner: Mutex<LoginState>,
}

#[derive(Default)]
struct LoginState {
    email: String,
    password: String,
    last_error: Option<ControllerError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSnapshot {
    pub email: String,
    pub has_password: bool,
    pub busy: bool,
    pub last_error: Option<ControllerError>,
}

impl LoginForm {
    pub fn new(auth: Arc<dyn AuthSession>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            auth,
            navigator,
            in_flight: InFlight::default(),
            inner: Mutex::new(LoginState::default()),
        }
    }

    pub async fn set_email(&self, email: impl Into<String>) {
        self.inner.lock().await.email = email.into();
    }

    pub async fn set_password(&self, password: impl Into<String>) {
        self.inner.lock().await.password = password.into();
    }

    /// Signs in with the entered credentials and goes to the dashboard on
    /// success. On failure the provider's message is kept for display and
    /// the fields stay filled in. A submit overlapping one still in flight
    /// fails with [`ControllerError::InProgress`] and leaves the form as is.
    pub async fn submit(&self) -> Result<(), ControllerError> {
        let Some(_busy) = self.in_flight.try_enter() else {
            debug!("login: submit rejected while a sign-in is in flight");
            return Err(ControllerError::InProgress);
        };

        let (email, password) = {
            let mut inner = self.inner.lock().await;
            if inner.email.trim().is_empty() || inner.password.is_empty() {
                let err = ControllerError::InvalidInput(
                    "email and password are required".to_string(),
                );
                inner.last_error = Some(err.clone());
                return Err(err);
            }
            inner.last_error = None;
            (inner.email.trim().to_string(), inner.password.clone())
        };

        match self.auth.sign_in(&email, &password).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "login: signed in");
                self.navigator.go_to(Route::ProtectedHome).await;
                Ok(())
            }
            Err(err) => {
                warn!("login: sign in rejected: {err:#}");
                let err = ControllerError::AuthError(err.to_string());
                self.inner.lock().await.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub async fn snapshot(&self) -> LoginSnapshot {
        let inner = self.inner.lock().await;
        LoginSnapshot {
            email: inner.email.clone(),
            has_password: !inner.password.is_empty(),
            busy: self.in_flight.is_busy(),
            last_error: inner.last_error.clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/login_tests.rs"]
mod tests;
