use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::SqlitePool;

/// Open (creating if missing) the coordinator database and run the schema
/// migration. WAL mode lets readers proceed while the single writer holds
/// the log.
///
/// Handles both "sqlite:./foo.db" and plain path forms.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let file_path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

    let abs_path = std::env::current_dir()?.join(file_path);
    if let Some(parent) = abs_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(&abs_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal),
    )
    .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes if they do not exist.
///
/// The partial unique index on (source, external_request_id) is the
/// idempotency mechanism's enforcement point: under a creation race the
/// index rejects the loser's insert and the guard re-selects the winner.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS workspaces (
            id   TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS agents (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            workspace_id TEXT NOT NULL,
            is_master    INTEGER NOT NULL DEFAULT 0,
            status       TEXT NOT NULL DEFAULT 'offline',
            session_key  TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tasks (
            id                  TEXT PRIMARY KEY,
            title               TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            status              TEXT NOT NULL DEFAULT 'inbox',
            priority            TEXT NOT NULL DEFAULT 'normal',
            assigned_agent_id   TEXT,
            created_by_agent_id TEXT,
            workspace_id        TEXT NOT NULL,
            initiative_id       TEXT,
            external_request_id TEXT,
            source              TEXT NOT NULL DEFAULT 'mission-control',
            task_type           TEXT NOT NULL DEFAULT 'openclaw-native',
            task_type_config    TEXT NOT NULL DEFAULT '{\"type\":\"openclaw-native\"}',
            parent_task_id      TEXT,
            evaluation_status   TEXT NOT NULL DEFAULT 'not_evaluated',
            due_date            TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS tasks_source_external_request
         ON tasks (source, external_request_id)
         WHERE external_request_id IS NOT NULL",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS tasks_initiative ON tasks (initiative_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            id           TEXT PRIMARY KEY,
            agent_id     TEXT NOT NULL,
            session_type TEXT NOT NULL DEFAULT 'main',
            status       TEXT NOT NULL DEFAULT 'active',
            task_id      TEXT,
            created_at   TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // At most one active session per agent; dispatch reuses the winner.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS sessions_one_active_per_agent
         ON sessions (agent_id)
         WHERE status = 'active'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS events (
            id         TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            agent_id   TEXT,
            task_id    TEXT,
            message    TEXT NOT NULL,
            metadata   TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS events_task ON events (task_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS activities (
            id          TEXT PRIMARY KEY,
            task_id     TEXT NOT NULL,
            agent_id    TEXT,
            description TEXT NOT NULL,
            created_at  TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS deliverables (
            id         TEXT PRIMARY KEY,
            task_id    TEXT NOT NULL,
            title      TEXT NOT NULL,
            path       TEXT,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversations (
            id         TEXT PRIMARY KEY,
            task_id    TEXT,
            agent_id   TEXT,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// True when `err` is a SQLite unique-constraint violation. The creation
/// and session paths turn this into re-select-the-winner rather than a
/// user-visible error.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.message().contains("UNIQUE constraint failed"))
        .unwrap_or(false)
}
