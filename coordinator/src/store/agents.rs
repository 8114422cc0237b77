use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shared_types::{Agent, AgentStatus};

fn agent_from_row(row: &SqliteRow) -> Result<Agent, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Agent {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        workspace_id: row.try_get("workspace_id")?,
        is_master: row.try_get::<i64, _>("is_master")? != 0,
        status: AgentStatus::parse(&status)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown agent status '{status}'").into()))?,
        session_key: row.try_get("session_key")?,
    })
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Agent>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(agent_from_row).transpose()
}

/// All master agents of a workspace, regardless of status.
pub async fn masters_in_workspace(
    pool: &SqlitePool,
    workspace_id: &str,
) -> Result<Vec<Agent>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM agents WHERE workspace_id = ? AND is_master = 1")
        .bind(workspace_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(agent_from_row).collect()
}

/// The workspace's master agent, used as the default activation dispatch
/// target. First by id for determinism when a workspace has several.
pub async fn master_for_workspace(
    pool: &SqlitePool,
    workspace_id: &str,
) -> Result<Option<Agent>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT * FROM agents WHERE workspace_id = ? AND is_master = 1 ORDER BY id LIMIT 1",
    )
    .bind(workspace_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(agent_from_row).transpose()
}

/// Seed helper; agent inventory is otherwise owned by an external sync job.
pub async fn insert(pool: &SqlitePool, agent: &Agent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO agents (id, name, workspace_id, is_master, status, session_key)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&agent.id)
    .bind(&agent.name)
    .bind(&agent.workspace_id)
    .bind(agent.is_master as i64)
    .bind(agent.status.as_str())
    .bind(&agent.session_key)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: AgentStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE agents SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
