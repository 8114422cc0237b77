use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use ulid::Ulid;

use shared_types::Event;

pub const TASK_CREATED: &str = "task_created";
pub const TASK_STATUS_CHANGED: &str = "task_status_changed";
pub const TASK_COMPLETED: &str = "task_completed";
pub const TASK_DISPATCHED: &str = "task_dispatched";
pub const PLANNING_QUESTION: &str = "planning_question";
pub const PLANNING_ANSWER: &str = "planning_answer";
pub const SPEC_LOCKED: &str = "spec_locked";

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
    pub message: String,
    pub metadata: serde_json::Value,
}

fn event_from_row(row: &SqliteRow) -> Result<Event, sqlx::Error> {
    let metadata: String = row.try_get("metadata")?;
    Ok(Event {
        id: row.try_get("id")?,
        event_type: row.try_get("event_type")?,
        agent_id: row.try_get("agent_id")?,
        task_id: row.try_get("task_id")?,
        message: row.try_get("message")?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| sqlx::Error::Decode(format!("bad event metadata: {e}").into()))?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn append(pool: &SqlitePool, new: NewEvent) -> Result<Event, sqlx::Error> {
    let event = Event {
        id: Ulid::new().to_string(),
        event_type: new.event_type,
        agent_id: new.agent_id,
        task_id: new.task_id,
        message: new.message,
        metadata: new.metadata,
        created_at: Utc::now(),
    };
    let metadata = event.metadata.to_string();

    sqlx::query(
        "INSERT INTO events (id, event_type, agent_id, task_id, message, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.id)
    .bind(&event.event_type)
    .bind(&event.agent_id)
    .bind(&event.task_id)
    .bind(&event.message)
    .bind(&metadata)
    .bind(event.created_at)
    .execute(pool)
    .await?;

    Ok(event)
}

pub async fn list_for_task(pool: &SqlitePool, task_id: &str) -> Result<Vec<Event>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM events WHERE task_id = ? ORDER BY id")
        .bind(task_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(event_from_row).collect()
}
