//! Admin session and authentication state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated admin session issued by the remote backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session change pushed by the remote backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    SessionExpired,
}

/// Whether an admin is signed in. `Unknown` until the first session check resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unknown,
    Authenticated(Session),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unknown => "unknown",
            AuthState::Authenticated(_) => "authenticated",
            AuthState::Unauthenticated => "unauthenticated",
        }
    }

    /// Transition driven by a remote notification.
    pub fn on_event(&self, event: &AuthEvent) -> AuthState {
        match event {
            AuthEvent::SignedIn(session) => AuthState::Authenticated(session.clone()),
            AuthEvent::SignedOut | AuthEvent::SessionExpired => AuthState::Unauthenticated,
        }
    }
}
