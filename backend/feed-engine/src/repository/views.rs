use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::ViewStore;
use crate::error::Result;

/// Postgres-backed view-record store
#[derive(Clone)]
pub struct PgViewStore {
    pool: PgPool,
}

impl PgViewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ViewStore for PgViewStore {
    async fn insert_view(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        // The unique (viewer_id, post_id) constraint makes the duplicate
        // write a no-op rather than an error; rows_affected tells the
        // caller whether this was the first view.
        let result = sqlx::query(
            r#"
            INSERT INTO view_records (viewer_id, post_id, first_seen_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (viewer_id, post_id) DO NOTHING
            "#,
        )
        .bind(viewer_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_seen(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM view_records
                WHERE viewer_id = $1 AND post_id = $2
            )
            "#,
        )
        .bind(viewer_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn load_seen(&self, viewer_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        let post_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT post_id
            FROM view_records
            WHERE viewer_id = $1
            ORDER BY first_seen_at DESC
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(post_ids)
    }
}
