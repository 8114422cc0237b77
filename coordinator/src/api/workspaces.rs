//! Workspace activation endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::activate::{ActivateRequest, ActivateResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /workspaces/activate - always 200 on successful bookkeeping,
/// even when dispatch degraded to a warning.
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let response = crate::activate::activate(&state, req).await?;
    Ok(Json(response))
}
