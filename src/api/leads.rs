//! Lead API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{success, success_local, ApiResult};
use crate::errors::{AppError, StoreError};
use crate::models::{Lead, LeadStatus, NewLead};
use crate::AppState;

/// Admin view of the lead list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadList {
    pub leads: Vec<Lead>,
    pub loading: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// POST /api/leads - Submit the public contact form.
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(request): Json<NewLead>,
) -> ApiResult<Lead> {
    let submitted = state.store.submit_lead(request).await?;
    if submitted.persisted {
        success(submitted.lead)
    } else {
        success_local(submitted.lead)
    }
}

/// GET /api/admin/leads - List leads held in memory, newest first.
pub async fn list_leads(State(state): State<AppState>) -> ApiResult<LeadList> {
    success(LeadList {
        leads: state.store.leads().await,
        loading: state.store.applications_loading(),
    })
}

/// POST /api/admin/leads/refresh - Reload leads from the backend.
pub async fn refresh_leads(State(state): State<AppState>) -> ApiResult<LeadList> {
    state.store.refresh_leads().await?;
    list_leads(State(state)).await
}

/// PUT /api/admin/leads/:id/status - Move a lead through its lifecycle.
pub async fn update_lead_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<()> {
    let status: LeadStatus = request.status.parse().map_err(AppError::Validation)?;

    match state.store.update_lead_status(&id, status).await {
        Ok(()) => success(()),
        Err(StoreError::BackendUnconfigured) => success_local(()),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /api/admin/leads/:id - Delete a lead.
pub async fn delete_lead(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    match state.store.delete_lead(&id).await {
        Ok(()) => success(()),
        Err(StoreError::BackendUnconfigured) => success_local(()),
        Err(e) => Err(e.into()),
    }
}
