//! Create-time validation. Everything here runs before any write
//! attempt; a failure is a 400, never a partial write.

use serde_json::{json, Value};

use shared_types::TaskType;

use crate::error::ApiError;
use crate::tasks::create::CreateTaskRequest;

/// Build and validate the task type from its tag + config blob.
///
/// The config shape is owned by each variant; parsing happens through
/// the tagged union rather than ad hoc field picking.
pub fn build_task_type(tag: Option<&str>, config: Option<&Value>) -> Result<TaskType, ApiError> {
    let tag = tag.unwrap_or("openclaw-native");

    let mut tagged = match config {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(other) => {
            return Err(ApiError::Validation(format!(
                "task_type_config must be an object, got {other}"
            )))
        }
        None => json!({}),
    };
    tagged["type"] = json!(tag);

    let task_type: TaskType = serde_json::from_value(tagged)
        .map_err(|e| ApiError::Validation(format!("invalid config for task type '{tag}': {e}")))?;

    match &task_type {
        TaskType::OpenclawNative => {}
        TaskType::ClaudeTeam {
            team_size,
            team_members,
            ..
        } => {
            if *team_size == 0 {
                return Err(ApiError::Validation(
                    "claude-team team_size must be at least 1".to_string(),
                ));
            }
            if team_members.len() as u32 > *team_size {
                return Err(ApiError::Validation(format!(
                    "claude-team lists {} members for a team of {team_size}",
                    team_members.len()
                )));
            }
        }
        TaskType::MultiHypothesis { hypotheses, .. } => {
            if hypotheses.is_empty() {
                return Err(ApiError::Validation(
                    "multi-hypothesis requires at least one hypothesis".to_string(),
                ));
            }
        }
    }

    Ok(task_type)
}

pub fn validate_create(req: &CreateTaskRequest) -> Result<TaskType, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be blank".to_string()));
    }
    if req.workspace_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "workspace_id must not be blank".to_string(),
        ));
    }
    if let Some(ext) = req.external_request_id.as_deref() {
        if ext.trim().is_empty() {
            return Err(ApiError::Validation(
                "external_request_id must not be blank".to_string(),
            ));
        }
    }

    build_task_type(req.task_type.as_deref(), req.task_type_config.as_ref())
}
