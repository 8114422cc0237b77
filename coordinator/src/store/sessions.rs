use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use shared_types::{Session, SessionStatus};

use crate::db::is_unique_violation;

fn session_from_row(row: &SqliteRow) -> Result<Session, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Session {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        session_type: row.try_get("session_type")?,
        status: SessionStatus::parse(&status).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown session status '{status}'").into())
        })?,
        task_id: row.try_get("task_id")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn find_active_for_agent(
    pool: &SqlitePool,
    agent_id: &str,
) -> Result<Option<Session>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM sessions WHERE agent_id = ? AND status = 'active'")
        .bind(agent_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(session_from_row).transpose()
}

/// Reuse the agent's active session or create one.
///
/// The partial unique index on (agent_id) WHERE status = 'active' makes
/// this race-safe: a concurrent creator loses the insert and re-selects
/// the winner's row.
pub async fn get_or_create_active(
    pool: &SqlitePool,
    agent_id: &str,
    session_type: &str,
    task_id: Option<&str>,
) -> Result<Session, sqlx::Error> {
    if let Some(existing) = find_active_for_agent(pool, agent_id).await? {
        return Ok(existing);
    }

    let session = Session {
        id: Uuid::new_v4().to_string(),
        agent_id: agent_id.to_string(),
        session_type: session_type.to_string(),
        status: SessionStatus::Active,
        task_id: task_id.map(ToString::to_string),
        created_at: Utc::now(),
    };

    let inserted = sqlx::query(
        "INSERT INTO sessions (id, agent_id, session_type, status, task_id, created_at)
         VALUES (?, ?, ?, 'active', ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.agent_id)
    .bind(&session.session_type)
    .bind(&session.task_id)
    .bind(session.created_at)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => Ok(session),
        Err(err) if is_unique_violation(&err) => {
            match find_active_for_agent(pool, agent_id).await? {
                Some(winner) => Ok(winner),
                None => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

pub async fn count_active_for_agent(
    pool: &SqlitePool,
    agent_id: &str,
) -> Result<i64, sqlx::Error> {
    let row =
        sqlx::query("SELECT COUNT(*) AS n FROM sessions WHERE agent_id = ? AND status = 'active'")
            .bind(agent_id)
            .fetch_one(pool)
            .await?;
    row.try_get("n")
}
