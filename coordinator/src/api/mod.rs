//! HTTP API routes for the coordinator.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

pub mod planning;
pub mod task_types;
pub mod tasks;
pub mod workspaces;

use crate::state::AppState;

/// Configure all API routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/{id}/dispatch", post(tasks::dispatch_task))
        .route("/tasks/{id}/events", get(tasks::list_task_events))
        .route("/tasks/{id}/planning/questions", post(planning::add_question))
        .route("/tasks/{id}/planning/answers", post(planning::add_answer))
        .route("/tasks/{id}/planning/lock", post(planning::lock_spec))
        .route("/workspaces/activate", post(workspaces::activate))
        .route("/task-types", get(task_types::list_task_types))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
