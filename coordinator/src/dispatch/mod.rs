//! Dispatch engine.
//!
//! Builds the outbound instruction for an agent, enforces the
//! orchestrator-conflict rule, manages the transport session, and
//! performs the remote call. Transport failures leave the task row
//! untouched; only a successful call moves the task to in_progress.

pub mod gateway;
pub mod message;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use shared_types::{AgentStatus, Task, TaskStatus};

use crate::error::ApiError;
use crate::ledger::resolver;
use crate::state::AppState;
use crate::store;
use crate::store::events::{NewEvent, TASK_DISPATCHED};

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub session_id: String,
    pub idempotency_key: String,
    pub message: String,
}

pub async fn dispatch_task(state: &AppState, task: &Task) -> Result<DispatchOutcome, ApiError> {
    let agent_id = task
        .assigned_agent_id
        .as_deref()
        .ok_or_else(|| ApiError::Validation("no assigned agent".to_string()))?;

    let agent = store::agents::find_by_id(&state.db, agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("agent '{agent_id}' not found")))?;

    // Two autonomous orchestrators must not drive the same external
    // channels at once: refuse while any other master in the workspace
    // is not offline.
    if agent.is_master {
        let conflicting: Vec<String> =
            store::agents::masters_in_workspace(&state.db, &agent.workspace_id)
                .await?
                .into_iter()
                .filter(|m| m.id != agent.id && m.status != AgentStatus::Offline)
                .map(|m| m.name)
                .collect();
        if !conflicting.is_empty() {
            return Err(ApiError::Conflict {
                message: format!(
                    "another orchestrator agent is active in workspace '{}'",
                    agent.workspace_id
                ),
                conflicting_agents: conflicting,
            });
        }
    }

    let initiative = match resolver::resolve_initiative_id(task) {
        Some(initiative_id) => match state.ledger.find_entry(&initiative_id).await {
            Some(entry) => {
                let task_count = store::tasks::count_for_initiative(&state.db, &initiative_id)
                    .await
                    .unwrap_or(0);
                Some(message::InitiativeContext {
                    title: entry.title,
                    status: entry.status.as_str().to_string(),
                    task_count,
                })
            }
            None => None,
        },
        None => None,
    };

    let outbound = message::build_message(task, initiative.as_ref());

    // One active session per agent; retries land on the same row.
    let session =
        store::sessions::get_or_create_active(&state.db, &agent.id, "main", Some(&task.id))
            .await?;

    // Transport-level dedup for retried dispatches.
    let idempotency_key = format!(
        "dispatch-{}",
        task.external_request_id.as_deref().unwrap_or(&task.id)
    );

    if !state.gateway.is_connected().await {
        state
            .gateway
            .connect()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(e.to_string()))?;
    }

    let session_key = agent
        .session_key
        .clone()
        .unwrap_or_else(|| session.id.clone());
    state
        .gateway
        .call(
            "chat.send",
            json!({
                "session_key": session_key,
                "message": outbound,
                "idempotency_key": idempotency_key,
            }),
        )
        .await
        .map_err(|e| ApiError::DispatchCall(e.to_string()))?;

    let now = Utc::now();
    store::tasks::update_status(&state.db, &task.id, TaskStatus::InProgress, now).await?;
    store::events::append(
        &state.db,
        NewEvent {
            event_type: TASK_DISPATCHED.to_string(),
            agent_id: Some(agent.id.clone()),
            task_id: Some(task.id.clone()),
            message: format!("task dispatched to agent '{}'", agent.name),
            metadata: json!({
                "session_id": session.id,
                "idempotency_key": idempotency_key,
            }),
        },
    )
    .await?;

    info!(task_id = %task.id, agent_id = %agent.id, "task dispatched");

    Ok(DispatchOutcome {
        session_id: session.id,
        idempotency_key,
        message: outbound,
    })
}
