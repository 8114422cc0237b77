//! Idempotency guard around task creation.
//!
//! At most one row exists per (source, external_request_id). Under a
//! creation race the partial unique index rejects the loser's insert;
//! the guard catches that violation and re-selects, so every caller
//! converges on the winner's row with a successful response.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_types::{EvaluationStatus, Task, TaskPriority, TaskStatus};

use crate::db;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store;
use crate::store::events::{NewEvent, TASK_CREATED};
use crate::tasks::validate;

pub const DEFAULT_SOURCE: &str = "mission-control";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub workspace_id: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
    #[serde(default)]
    pub created_by_agent_id: Option<String>,
    #[serde(default)]
    pub initiative_id: Option<String>,
    #[serde(default)]
    pub external_request_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub task_type_config: Option<Value>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub task: Task,
    /// True when an existing row was returned instead of a new one.
    pub idempotent: bool,
}

pub async fn create_task(
    state: &AppState,
    req: CreateTaskRequest,
) -> Result<CreateOutcome, ApiError> {
    let task_type = validate::validate_create(&req)?;

    // Depth <= 1: the designated parent must itself be a root task.
    if let Some(parent_id) = req.parent_task_id.as_deref() {
        let parent = store::tasks::find_by_id(&state.db, parent_id)
            .await?
            .ok_or_else(|| {
                ApiError::Validation(format!("parent task '{parent_id}' does not exist"))
            })?;
        if parent.parent_task_id.is_some() {
            return Err(ApiError::Validation("depth limit exceeded".to_string()));
        }
    }

    let source = req.source.clone().unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    // Fast path: a retried request returns the original row unchanged.
    if let Some(ext) = req.external_request_id.as_deref() {
        if let Some(existing) = store::tasks::find_by_request_key(&state.db, &source, ext).await? {
            return Ok(CreateOutcome {
                task: existing,
                idempotent: true,
            });
        }
    }

    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4().to_string(),
        title: req.title.trim().to_string(),
        description: req.description.clone(),
        status: req.status.unwrap_or(TaskStatus::Inbox),
        priority: req.priority.unwrap_or_default(),
        assigned_agent_id: req.assigned_agent_id.clone(),
        created_by_agent_id: req.created_by_agent_id.clone(),
        workspace_id: req.workspace_id.clone(),
        initiative_id: req.initiative_id.clone(),
        external_request_id: req.external_request_id.clone(),
        source,
        task_type,
        parent_task_id: req.parent_task_id.clone(),
        evaluation_status: EvaluationStatus::NotEvaluated,
        due_date: req.due_date,
        created_at: now,
        updated_at: now,
    };

    match store::tasks::insert(&state.db, &task).await {
        Ok(()) => {
            store::events::append(
                &state.db,
                NewEvent {
                    event_type: TASK_CREATED.to_string(),
                    agent_id: task.created_by_agent_id.clone(),
                    task_id: Some(task.id.clone()),
                    message: format!("task '{}' created", task.title),
                    metadata: json!({
                        "source": task.source,
                        "external_request_id": task.external_request_id,
                    }),
                },
            )
            .await?;
            Ok(CreateOutcome {
                task,
                idempotent: false,
            })
        }
        // Lost the insert race: converge on the winner's row.
        Err(err) if db::is_unique_violation(&err) => {
            let ext = task.external_request_id.as_deref().unwrap_or_default();
            match store::tasks::find_by_request_key(&state.db, &task.source, ext).await? {
                Some(winner) => Ok(CreateOutcome {
                    task: winner,
                    idempotent: true,
                }),
                None => Err(ApiError::Conflict {
                    message: "task creation raced with a conflicting write; retry".to_string(),
                    conflicting_agents: Vec::new(),
                }),
            }
        }
        Err(err) => Err(err.into()),
    }
}
