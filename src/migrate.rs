use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Knowledge documents; metadata is kept as JSON since it is only read
    // back whole, never queried by field.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one row: the latest player snapshot.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshot_cache (
            slot INTEGER PRIMARY KEY CHECK (slot = 0),
            snapshot_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_knowledge_type ON knowledge(type)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_knowledge_created_at ON knowledge(created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
