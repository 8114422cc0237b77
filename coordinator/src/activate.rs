//! Activation orchestrator.
//!
//! A composite idempotent entry point: resolve the workspace, create the
//! activation task exactly once per external request id, resolve or
//! create the initiative, bulk-promote the initiative's planning tasks,
//! attempt a best-effort dispatch, and mirror the transition into the
//! ledger. Bookkeeping success always answers 200; a dispatch failure
//! only downgrades to a `warning` field.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use ulid::Ulid;

use shared_types::TaskStatus;

use crate::dispatch;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store;
use crate::store::events::{NewEvent, TASK_STATUS_CHANGED};
use crate::tasks::create::{self, CreateTaskRequest, DEFAULT_SOURCE};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub external_request_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub initiative_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateResponse {
    pub success: bool,
    pub task_id: String,
    pub initiative_id: String,
    pub external_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub gateway_triggered: bool,
    pub idempotent: bool,
}

fn new_initiative_id() -> String {
    // Last five characters of a ULID carry the most entropy.
    let ulid = Ulid::new().to_string();
    format!("INIT-{}", ulid[21..].to_lowercase())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn activate(
    state: &AppState,
    req: ActivateRequest,
) -> Result<ActivateResponse, ApiError> {
    let slug = non_blank(req.workspace.clone())
        .ok_or_else(|| ApiError::Validation("workspace must not be blank".to_string()))?;

    let workspace = store::workspaces::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("workspace '{slug}' not found")))?;

    let external_request_id = non_blank(req.external_request_id.clone())
        .unwrap_or_else(|| format!("act-{}", Ulid::new().to_string().to_lowercase()));

    // A repeated activation returns the recorded outcome and does not
    // re-issue the dispatch call.
    if let Some(existing) =
        store::tasks::find_by_request_key(&state.db, DEFAULT_SOURCE, &external_request_id).await?
    {
        return Ok(ActivateResponse {
            success: true,
            task_id: existing.id,
            initiative_id: existing.initiative_id.unwrap_or_default(),
            external_request_id,
            warning: None,
            gateway_triggered: false,
            idempotent: true,
        });
    }

    let initiative_id = non_blank(req.initiative_id.clone()).unwrap_or_else(new_initiative_id);
    let title = non_blank(req.title.clone())
        .unwrap_or_else(|| format!("{initiative_id}: activate workspace {}", workspace.name));

    let created = create::create_task(
        state,
        CreateTaskRequest {
            title,
            description: req.description.clone().unwrap_or_default(),
            workspace_id: workspace.id.clone(),
            status: Some(TaskStatus::Planning),
            initiative_id: Some(initiative_id.clone()),
            external_request_id: Some(external_request_id.clone()),
            ..Default::default()
        },
    )
    .await?;

    if created.idempotent {
        // Lost a concurrent activation race; the winner owns the dispatch.
        return Ok(ActivateResponse {
            success: true,
            task_id: created.task.id,
            initiative_id: created.task.initiative_id.unwrap_or(initiative_id),
            external_request_id,
            warning: None,
            gateway_triggered: false,
            idempotent: true,
        });
    }
    let mut task = created.task;

    // Everything parked in planning under this initiative goes live,
    // including the activation task itself.
    let now = Utc::now();
    let promoted = store::tasks::promote_initiative_tasks(
        &state.db,
        &initiative_id,
        TaskStatus::Planning,
        TaskStatus::InProgress,
        now,
    )
    .await?;
    task.status = TaskStatus::InProgress;

    store::events::append(
        &state.db,
        NewEvent {
            event_type: TASK_STATUS_CHANGED.to_string(),
            agent_id: None,
            task_id: Some(task.id.clone()),
            message: format!("initiative '{initiative_id}' activated"),
            metadata: json!({
                "from": TaskStatus::Planning.as_str(),
                "to": TaskStatus::InProgress.as_str(),
                "promoted_tasks": promoted.len(),
            }),
        },
    )
    .await?;

    // Best-effort dispatch: default target is the workspace's master.
    let agent = match req.agent_id.as_deref() {
        Some(id) => store::agents::find_by_id(&state.db, id).await?,
        None => store::agents::master_for_workspace(&state.db, &workspace.id).await?,
    };

    let mut warning = None;
    let mut gateway_triggered = false;
    match agent {
        Some(agent) => {
            task.assigned_agent_id = Some(agent.id.clone());
            store::tasks::update(&state.db, &task).await?;
            match dispatch::dispatch_task(state, &task).await {
                Ok(_) => {
                    gateway_triggered = true;
                    task.status = TaskStatus::InProgress;
                }
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "activation dispatch failed");
                    warning = Some(err.to_string());
                }
            }
        }
        None => {
            warning = Some(format!(
                "no dispatchable agent in workspace '{}'",
                workspace.slug
            ));
        }
    }

    // Mirror planned -> in-progress into the ledger.
    state
        .ledger
        .record_task_status(
            &task,
            TaskStatus::InProgress.as_str(),
            &format!("workspace '{}' activated", workspace.slug),
        )
        .await;

    info!(
        workspace = %workspace.slug,
        initiative_id = %initiative_id,
        task_id = %task.id,
        gateway_triggered,
        "workspace activated"
    );

    Ok(ActivateResponse {
        success: true,
        task_id: task.id,
        initiative_id,
        external_request_id,
        warning,
        gateway_triggered,
        idempotent: false,
    })
}
