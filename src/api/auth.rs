//! Admin login endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::{AppError, StoreError};
use crate::models::Session;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Current authentication status as seen by the store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: &'static str,
    pub authenticated: bool,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// POST /api/auth/login - Sign in as admin.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Session> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let session = state.store.login(&request.email, &request.password).await?;

    // Admin lists should be current as soon as the panel opens
    if let Err(e) = state.store.refresh_leads().await {
        tracing::warn!("Lead refresh after login failed: {}", e);
    }
    success(session)
}

/// POST /api/auth/logout - Sign out; always clears the local session.
pub async fn logout(State(state): State<AppState>) -> ApiResult<()> {
    match state.store.logout().await {
        Ok(()) | Err(StoreError::BackendUnconfigured) => success(()),
        Err(e) => {
            tracing::warn!("Sign-out was not confirmed by the backend: {}", e);
            success(())
        }
    }
}

/// GET /api/auth/session - Report the authentication state.
pub async fn session_status(State(state): State<AppState>) -> ApiResult<SessionStatus> {
    let auth = state.store.auth_state();
    success(SessionStatus {
        state: auth.as_str(),
        authenticated: auth.is_authenticated(),
        loading: state.store.is_auth_loading(),
        email: auth.session().map(|s| s.email.clone()),
    })
}
