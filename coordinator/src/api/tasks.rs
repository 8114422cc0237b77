//! Task endpoints: creation, board reads, transitions, deletion,
//! dispatch, and the audit trail.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use shared_types::TaskStatus;

use crate::dispatch;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store;
use crate::tasks::create::{self, CreateTaskRequest};
use crate::tasks::transition::{self, UpdateTaskRequest};

/// POST /tasks - 201 on creation, 200 on an idempotent hit.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Response, ApiError> {
    let outcome = create::create_task(&state, req).await?;
    let status = if outcome.idempotent {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "idempotent": outcome.idempotent,
            "task": outcome.task,
        })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub workspace_id: Option<String>,
    pub status: Option<String>,
    pub initiative_id: Option<String>,
}

/// GET /tasks - board reads, filterable.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            TaskStatus::parse(s)
                .ok_or_else(|| ApiError::Validation(format!("unknown status '{s}'")))
        })
        .transpose()?;

    let filter = store::tasks::TaskFilter {
        workspace_id: query.workspace_id,
        status,
        initiative_id: query.initiative_id,
    };
    let tasks = store::tasks::list(&state.db, &filter).await?;
    Ok(Json(json!({ "success": true, "tasks": tasks })))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task = store::tasks::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task '{id}' not found")))?;
    Ok(Json(json!({ "success": true, "task": task })))
}

/// PATCH /tasks/{id} - transitions with their side effects.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = transition::apply(&state, &id, req).await?;
    let mut body = json!({ "success": true, "task": outcome.task });
    if let Some(warning) = outcome.dispatch_warning {
        body["dispatch_warning"] = json!(warning);
    }
    Ok(Json(body))
}

/// DELETE /tasks/{id} - cascades to activities and deliverables,
/// nullifies conversation links.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = store::tasks::delete_cascade(&state.db, &id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("task '{id}' not found")));
    }
    Ok(Json(json!({ "success": true })))
}

/// POST /tasks/{id}/dispatch - explicit dispatch request.
pub async fn dispatch_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task = store::tasks::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task '{id}' not found")))?;

    let outcome = dispatch::dispatch_task(&state, &task).await?;

    // Re-read: a successful dispatch moved the row to in_progress.
    let task = store::tasks::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task '{id}' not found")))?;

    Ok(Json(json!({
        "success": true,
        "task": task,
        "session_id": outcome.session_id,
        "idempotency_key": outcome.idempotency_key,
    })))
}

/// GET /tasks/{id}/events - audit trail reads.
pub async fn list_task_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if store::tasks::find_by_id(&state.db, &id).await?.is_none() {
        return Err(ApiError::NotFound(format!("task '{id}' not found")));
    }
    let events = store::events::list_for_task(&state.db, &id).await?;
    Ok(Json(json!({ "success": true, "events": events })))
}
