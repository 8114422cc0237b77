//! Planning sub-state.
//!
//! A task parked in `planning` collects clarifying questions and answers
//! as audit events; "lock spec" is the terminal action that records the
//! lock and force-moves the task to `inbox` through the same transition
//! primitive every other caller uses.

use serde::Deserialize;
use serde_json::json;

use shared_types::{Task, TaskStatus};

use crate::error::ApiError;
use crate::state::AppState;
use crate::store;
use crate::store::events::{NewEvent, PLANNING_ANSWER, PLANNING_QUESTION, SPEC_LOCKED};
use crate::tasks::transition::{self, TransitionOutcome, UpdateTaskRequest};

#[derive(Debug, Clone, Deserialize)]
pub struct PlanningNoteRequest {
    pub text: String,
    #[serde(default)]
    pub acting_agent_id: Option<String>,
}

async fn planning_task(state: &AppState, task_id: &str) -> Result<Task, ApiError> {
    let task = store::tasks::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task '{task_id}' not found")))?;
    if task.status != TaskStatus::Planning {
        return Err(ApiError::Validation(format!(
            "task '{task_id}' is not in planning (status: {})",
            task.status.as_str()
        )));
    }
    Ok(task)
}

pub async fn add_question(
    state: &AppState,
    task_id: &str,
    req: PlanningNoteRequest,
) -> Result<shared_types::Event, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("question must not be blank".to_string()));
    }
    let task = planning_task(state, task_id).await?;
    let event = store::events::append(
        &state.db,
        NewEvent {
            event_type: PLANNING_QUESTION.to_string(),
            agent_id: req.acting_agent_id,
            task_id: Some(task.id),
            message: req.text,
            metadata: json!({}),
        },
    )
    .await?;
    Ok(event)
}

pub async fn add_answer(
    state: &AppState,
    task_id: &str,
    req: PlanningNoteRequest,
) -> Result<shared_types::Event, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("answer must not be blank".to_string()));
    }
    let task = planning_task(state, task_id).await?;
    let event = store::events::append(
        &state.db,
        NewEvent {
            event_type: PLANNING_ANSWER.to_string(),
            agent_id: req.acting_agent_id,
            task_id: Some(task.id),
            message: req.text,
            metadata: json!({}),
        },
    )
    .await?;
    Ok(event)
}

/// Lock the spec: record the lock and force-transition to `inbox`.
pub async fn lock_spec(
    state: &AppState,
    task_id: &str,
    acting_agent_id: Option<String>,
) -> Result<TransitionOutcome, ApiError> {
    let task = planning_task(state, task_id).await?;

    store::events::append(
        &state.db,
        NewEvent {
            event_type: SPEC_LOCKED.to_string(),
            agent_id: acting_agent_id.clone(),
            task_id: Some(task.id.clone()),
            message: format!("spec locked for task '{}'", task.title),
            metadata: json!({}),
        },
    )
    .await?;

    transition::apply(
        state,
        task_id,
        UpdateTaskRequest {
            status: Some(TaskStatus::Inbox),
            acting_agent_id,
            ..Default::default()
        },
    )
    .await
}
