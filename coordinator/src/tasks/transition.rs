//! State transition controller.
//!
//! The board allows moving a task to almost any state; three transitions
//! carry mandatory side effects:
//! 1. a change of assigned agent, or a move into `assigned` with an agent
//!    set, triggers exactly one dispatch attempt;
//! 2. every status change logs one event, `task_completed` for `done`;
//! 3. `review` → `done` from a named acting agent requires that agent's
//!    master flag; the rejection leaves the task untouched.
//! Status changes that resolve to an initiative also invoke the ledger
//! writeback, best-effort.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use shared_types::{EvaluationStatus, Task, TaskPriority, TaskStatus};

use crate::dispatch;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store;
use crate::store::events::{NewEvent, TASK_COMPLETED, TASK_STATUS_CHANGED};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
    #[serde(default)]
    pub initiative_id: Option<String>,
    #[serde(default)]
    pub evaluation_status: Option<EvaluationStatus>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// The agent requesting the change; absent for human-originated
    /// changes, which are always permitted.
    #[serde(default)]
    pub acting_agent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub task: Task,
    /// Set when an auto-triggered dispatch attempt failed; the PATCH
    /// itself still succeeds.
    pub dispatch_warning: Option<String>,
}

pub async fn apply(
    state: &AppState,
    task_id: &str,
    req: UpdateTaskRequest,
) -> Result<TransitionOutcome, ApiError> {
    let mut task = store::tasks::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task '{task_id}' not found")))?;

    let old_status = task.status;
    let old_agent = task.assigned_agent_id.clone();

    // Approval gate, checked before any mutation. A transition with no
    // acting agent is the human-override escape hatch.
    if old_status == TaskStatus::Review && req.status == Some(TaskStatus::Done) {
        if let Some(acting) = req.acting_agent_id.as_deref() {
            let is_master = store::agents::find_by_id(&state.db, acting)
                .await?
                .map(|a| a.is_master)
                .unwrap_or(false);
            if !is_master {
                return Err(ApiError::Authorization(format!(
                    "agent '{acting}' may not move a task from review to done"
                )));
            }
        }
    }

    if let Some(title) = req.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("title must not be blank".to_string()));
        }
        task.title = title;
    }
    if let Some(description) = req.description {
        task.description = description;
    }
    if let Some(priority) = req.priority {
        task.priority = priority;
    }
    if let Some(agent_id) = req.assigned_agent_id {
        task.assigned_agent_id = Some(agent_id);
    }
    if let Some(initiative_id) = req.initiative_id {
        task.initiative_id = Some(initiative_id);
    }
    if let Some(evaluation) = req.evaluation_status {
        task.evaluation_status = evaluation;
    }
    if let Some(due) = req.due_date {
        task.due_date = Some(due);
    }
    if let Some(status) = req.status {
        task.status = status;
    }
    task.updated_at = Utc::now();

    store::tasks::update(&state.db, &task).await?;

    let status_changed = task.status != old_status;
    if status_changed {
        let event_type = if task.status == TaskStatus::Done {
            TASK_COMPLETED
        } else {
            TASK_STATUS_CHANGED
        };
        store::events::append(
            &state.db,
            NewEvent {
                event_type: event_type.to_string(),
                agent_id: req.acting_agent_id.clone(),
                task_id: Some(task.id.clone()),
                message: format!(
                    "task '{}' moved from {} to {}",
                    task.title,
                    old_status.as_str(),
                    task.status.as_str()
                ),
                metadata: json!({
                    "from": old_status.as_str(),
                    "to": task.status.as_str(),
                }),
            },
        )
        .await?;

        // Best-effort mirror into the ledger; must never fail the PATCH.
        state
            .ledger
            .record_task_status(
                &task,
                task.status.as_str(),
                &format!("task '{}' moved to {}", task.title, task.status.as_str()),
            )
            .await;
    }

    // Exactly one dispatch attempt per qualifying PATCH, even when both
    // the agent changed and the status entered `assigned`.
    let agent_changed = task.assigned_agent_id != old_agent && task.assigned_agent_id.is_some();
    let entered_assigned = status_changed
        && task.status == TaskStatus::Assigned
        && task.assigned_agent_id.is_some();

    let mut dispatch_warning = None;
    if agent_changed || entered_assigned {
        match dispatch::dispatch_task(state, &task).await {
            Ok(_) => {
                // The engine moved the row to in_progress.
                task.status = TaskStatus::InProgress;
            }
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "auto-dispatch failed");
                dispatch_warning = Some(err.to_string());
            }
        }
    }

    Ok(TransitionOutcome {
        task,
        dispatch_warning,
    })
}
