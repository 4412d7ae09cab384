//! SQLite-backed [`KnowledgeStore`] and [`SnapshotStore`] implementation.
//!
//! Maps each store operation onto the `knowledge` and `snapshot_cache`
//! tables created by [`crate::migrate`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::KnowledgeStore;
use crate::cache::SnapshotStore;
use crate::models::{CachedSnapshot, KnowledgeDocument, KnowledgeMetadata, KnowledgeType};

/// Wraps a [`SqlitePool`]. Cloning shares the pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: &SqliteRow) -> Result<KnowledgeDocument> {
    let id: String = row.get("id");
    let kind: String = row.get("type");
    let metadata_json: String = row.get("metadata_json");
    let created_ms: i64 = row.get("created_at");

    let metadata: KnowledgeMetadata = serde_json::from_str(&metadata_json)
        .with_context(|| format!("corrupt metadata for knowledge {}", id))?;
    let created_at = DateTime::from_timestamp_millis(created_ms)
        .ok_or_else(|| anyhow::anyhow!("invalid created_at for knowledge {}", id))?;

    Ok(KnowledgeDocument {
        kind: kind.parse()?,
        content: row.get("content"),
        metadata,
        created_at,
        id,
    })
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn insert(&self, doc: &KnowledgeDocument) -> Result<()> {
        let metadata_json = serde_json::to_string(&doc.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO knowledge (id, type, content, metadata_json, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(doc.kind.as_str())
        .bind(&doc.content)
        .bind(&metadata_json)
        .bind(doc.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(
        &self,
        types: Option<&[KnowledgeType]>,
        limit: usize,
    ) -> Result<Vec<KnowledgeDocument>> {
        let mut sql = String::from(
            "SELECT id, type, content, metadata_json, created_at FROM knowledge",
        );
        if let Some(ts) = types {
            if ts.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ts.len()].join(", ");
            sql.push_str(&format!(" WHERE type IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY created_at DESC, seq DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(ts) = types {
            for t in ts {
                query = query.bind(t.as_str());
            }
        }
        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn load(&self) -> Result<Option<CachedSnapshot>> {
        let row = sqlx::query("SELECT snapshot_json FROM snapshot_cache WHERE slot = 0")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let json: String = row.get("snapshot_json");
                let snapshot = serde_json::from_str(&json)
                    .with_context(|| "corrupt snapshot_cache row")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &CachedSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO snapshot_cache (slot, snapshot_json, created_at)
            VALUES (0, ?, ?)
            ON CONFLICT(slot) DO UPDATE SET
                snapshot_json = excluded.snapshot_json,
                created_at = excluded.created_at
            "#,
        )
        .bind(&json)
        .bind(snapshot.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
