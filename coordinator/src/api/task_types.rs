//! Task type inventory.

use axum::Json;
use serde_json::json;

/// GET /task-types - lists the variants and their config schemas.
pub async fn list_task_types() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "task_types": [
            {
                "type": "openclaw-native",
                "config_schema": null,
            },
            {
                "type": "claude-team",
                "config_schema": {
                    "team_size": "integer >= 1",
                    "team_members": "array of agent names, at most team_size (optional)",
                    "model": "string (optional)",
                },
            },
            {
                "type": "multi-hypothesis",
                "config_schema": {
                    "hypotheses": "non-empty array of strings",
                    "coordinator": "string (optional)",
                },
            },
        ],
    }))
}
