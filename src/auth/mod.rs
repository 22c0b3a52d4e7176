//! Session-token authentication for admin routes.
//!
//! Implements constant-time comparison to mitigate timing attacks.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::store::ContentStore;

/// Alternative header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Admin guard: the request must carry the access token of the session the
/// store currently holds.
pub async fn session_auth_layer(
    store: Arc<ContentStore>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = store.session_token() else {
        return unauthorized_response("Admin login required");
    };

    let provided = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|s| s.to_string());

    match provided {
        Some(token) if constant_time_compare(&token, &expected) => next.run(request).await,
        Some(_) => unauthorized_response("Invalid session token"),
        None => unauthorized_response("Missing session token"),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}
