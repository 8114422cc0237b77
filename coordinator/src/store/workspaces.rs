use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shared_types::Workspace;

fn workspace_from_row(row: &SqliteRow) -> Result<Workspace, sqlx::Error> {
    Ok(Workspace {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
    })
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Workspace>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM workspaces WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(workspace_from_row).transpose()
}

/// Seed helper; workspace inventory is owned elsewhere.
pub async fn insert(pool: &SqlitePool, workspace: &Workspace) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO workspaces (id, name, slug) VALUES (?, ?, ?)")
        .bind(&workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.slug)
        .execute(pool)
        .await?;
    Ok(())
}
