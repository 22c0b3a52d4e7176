//! REST API module.
//!
//! Public news and contact-form endpoints plus the admin area.

mod articles;
mod auth;
mod leads;

pub use articles::*;
pub use auth::*;
pub use leads::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    /// False when the change only exists in this process's memory
    pub persisted: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            persisted: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Successful response for a write that was applied in memory only.
pub fn success_local<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse {
        success: true,
        data,
        persisted: false,
    })
}
