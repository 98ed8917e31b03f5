// SQLite CheckpointStore Implementation

use async_trait::async_trait;
use backfill_core::domain::{Cursor, JobCheckpoint};
use backfill_core::error::{AppError, Result};
use backfill_core::port::{CheckpointStore, TimeProvider};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();
                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

/// Durable checkpoint store backed by the `checkpoints` table
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, job_key: &str) -> Result<Option<JobCheckpoint>> {
        let row = sqlx::query(
            "SELECT job_key, cursor, updated_at FROM checkpoints WHERE job_key = ?",
        )
        .bind(job_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| {
            JobCheckpoint::new(
                row.get::<String, _>("job_key"),
                Cursor::new(row.get::<String, _>("cursor")),
                row.get::<i64, _>("updated_at"),
            )
        }))
    }

    async fn save(&self, job_key: &str, cursor: &Cursor) -> Result<()> {
        let now = self.time_provider.now_millis();
        sqlx::query(
            r#"
            INSERT INTO checkpoints (job_key, cursor, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(job_key) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(job_key)
        .bind(cursor.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(job_key = %job_key, cursor = %cursor, "Checkpoint saved");
        Ok(())
    }

    async fn clear(&self, job_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE job_key = ?")
            .bind(job_key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(job_key = %job_key, "Checkpoint cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use backfill_core::port::time_provider::SystemTimeProvider;

    async fn store() -> SqliteCheckpointStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteCheckpointStore::new(pool, Arc::new(SystemTimeProvider))
    }

    #[tokio::test]
    async fn load_returns_none_on_fresh_start() {
        let store = store().await;
        assert!(store.load("wiki_content_fill").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = store().await;
        store
            .save("wiki_content_fill", &Cursor::new("100"))
            .await
            .unwrap();
        store
            .save("wiki_content_fill", &Cursor::new("200"))
            .await
            .unwrap();

        let cp = store.load("wiki_content_fill").await.unwrap().unwrap();
        assert_eq!(cp.cursor.as_str(), "200");
        assert_eq!(cp.job_key, "wiki_content_fill");
    }

    #[tokio::test]
    async fn clear_removes_only_that_job() {
        let store = store().await;
        store.save("a", &Cursor::new("1")).await.unwrap();
        store.save("b", &Cursor::new("2")).await.unwrap();

        store.clear("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
        assert!(store.load("b").await.unwrap().is_some());

        // Clearing an absent key is fine
        store.clear("a").await.unwrap();
    }
}
