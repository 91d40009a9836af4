use serde::{Deserialize, Serialize};

use crate::domain::Session;

/// Session-change notifications emitted by the identity provider. Kinds the
/// client does not act on collapse into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn signed_in(session: Session) -> Self {
        Self {
            event: AuthChangeEvent::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            event: AuthChangeEvent::SignedOut,
            session: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    ProtectedHome,
    PublicLogin,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::ProtectedHome => "/dashboard",
            Route::PublicLogin => "/login",
        }
    }
}
