//! Planning sub-state endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tasks::planning::{self, PlanningNoteRequest};

/// POST /tasks/{id}/planning/questions
pub async fn add_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PlanningNoteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event = planning::add_question(&state, &id, req).await?;
    Ok(Json(json!({ "success": true, "event": event })))
}

/// POST /tasks/{id}/planning/answers
pub async fn add_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PlanningNoteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event = planning::add_answer(&state, &id, req).await?;
    Ok(Json(json!({ "success": true, "event": event })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LockSpecRequest {
    #[serde(default)]
    pub acting_agent_id: Option<String>,
}

/// POST /tasks/{id}/planning/lock - terminal action, force-moves the
/// task to inbox.
pub async fn lock_spec(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<LockSpecRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = planning::lock_spec(&state, &id, req.acting_agent_id).await?;
    Ok(Json(json!({ "success": true, "task": outcome.task })))
}
