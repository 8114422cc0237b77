use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shared_types::{EvaluationStatus, Task, TaskPriority, TaskStatus, TaskType};

fn decode_err(msg: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(msg.into().into())
}

fn task_from_row(row: &SqliteRow) -> Result<Task, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let evaluation: String = row.try_get("evaluation_status")?;
    let config: String = row.try_get("task_type_config")?;

    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: TaskStatus::parse(&status)
            .ok_or_else(|| decode_err(format!("unknown task status '{status}'")))?,
        priority: TaskPriority::parse(&priority)
            .ok_or_else(|| decode_err(format!("unknown task priority '{priority}'")))?,
        assigned_agent_id: row.try_get("assigned_agent_id")?,
        created_by_agent_id: row.try_get("created_by_agent_id")?,
        workspace_id: row.try_get("workspace_id")?,
        initiative_id: row.try_get("initiative_id")?,
        external_request_id: row.try_get("external_request_id")?,
        source: row.try_get("source")?,
        task_type: serde_json::from_str::<TaskType>(&config)
            .map_err(|e| decode_err(format!("bad task_type_config: {e}")))?,
        parent_task_id: row.try_get("parent_task_id")?,
        evaluation_status: EvaluationStatus::parse(&evaluation)
            .ok_or_else(|| decode_err(format!("unknown evaluation status '{evaluation}'")))?,
        due_date: row.try_get("due_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn insert(pool: &SqlitePool, task: &Task) -> Result<(), sqlx::Error> {
    let config = serde_json::to_string(&task.task_type)
        .map_err(|e| decode_err(format!("task_type_config encode: {e}")))?;

    sqlx::query(
        "INSERT INTO tasks (
            id, title, description, status, priority,
            assigned_agent_id, created_by_agent_id, workspace_id,
            initiative_id, external_request_id, source,
            task_type, task_type_config, parent_task_id,
            evaluation_status, due_date, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(&task.assigned_agent_id)
    .bind(&task.created_by_agent_id)
    .bind(&task.workspace_id)
    .bind(&task.initiative_id)
    .bind(&task.external_request_id)
    .bind(&task.source)
    .bind(task.task_type.tag())
    .bind(&config)
    .bind(&task.parent_task_id)
    .bind(task.evaluation_status.as_str())
    .bind(task.due_date)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(task_from_row).transpose()
}

/// Look up a task by its idempotency key. Only meaningful when
/// external_request_id is non-null; null keys never deduplicate.
pub async fn find_by_request_key(
    pool: &SqlitePool,
    source: &str,
    external_request_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM tasks WHERE source = ? AND external_request_id = ?")
        .bind(source)
        .bind(external_request_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(task_from_row).transpose()
}

/// Persist the mutable columns of a task (PATCH path).
pub async fn update(pool: &SqlitePool, task: &Task) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tasks SET
            title = ?, description = ?, status = ?, priority = ?,
            assigned_agent_id = ?, initiative_id = ?,
            evaluation_status = ?, due_date = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(&task.assigned_agent_id)
    .bind(&task.initiative_id)
    .bind(task.evaluation_status.as_str())
    .bind(task.due_date)
    .bind(task.updated_at)
    .bind(&task.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    pub workspace_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub initiative_id: Option<String>,
}

pub async fn list(pool: &SqlitePool, filter: &TaskFilter) -> Result<Vec<Task>, sqlx::Error> {
    let mut sql = String::from("SELECT * FROM tasks WHERE 1 = 1");
    if filter.workspace_id.is_some() {
        sql.push_str(" AND workspace_id = ?");
    }
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.initiative_id.is_some() {
        sql.push_str(" AND initiative_id = ?");
    }
    sql.push_str(" ORDER BY created_at");

    let mut query = sqlx::query(&sql);
    if let Some(ws) = &filter.workspace_id {
        query = query.bind(ws);
    }
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(init) = &filter.initiative_id {
        query = query.bind(init);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(task_from_row).collect()
}

pub async fn count_for_initiative(
    pool: &SqlitePool,
    initiative_id: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM tasks WHERE initiative_id = ?")
        .bind(initiative_id)
        .fetch_one(pool)
        .await?;
    row.try_get("n")
}

/// Bulk-promote every task of an initiative out of `from` into `to`.
/// Returns the promoted task ids.
pub async fn promote_initiative_tasks(
    pool: &SqlitePool,
    initiative_id: &str,
    from: TaskStatus,
    to: TaskStatus,
    now: DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT id FROM tasks WHERE initiative_id = ? AND status = ?")
        .bind(initiative_id)
        .bind(from.as_str())
        .fetch_all(pool)
        .await?;
    let ids: Vec<String> = rows
        .iter()
        .map(|r| r.try_get::<String, _>("id"))
        .collect::<Result<_, _>>()?;

    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE initiative_id = ? AND status = ?")
        .bind(to.as_str())
        .bind(now)
        .bind(initiative_id)
        .bind(from.as_str())
        .execute(pool)
        .await?;

    Ok(ids)
}

/// Delete a task, cascading to its activities and deliverables and
/// nullifying conversation links. Returns false when the task is unknown.
pub async fn delete_cascade(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM activities WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM deliverables WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE conversations SET task_id = NULL WHERE task_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}
