use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::RelationshipStore;
use crate::domain::Relationship;
use crate::error::Result;

/// Postgres-backed relationship store
#[derive(Clone)]
pub struct PgRelationshipStore {
    pool: PgPool,
}

impl PgRelationshipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn edges_touching(&self, user_id: Uuid) -> Result<Vec<Relationship>> {
        let edges = sqlx::query_as::<_, Relationship>(
            r#"
            SELECT subject_id, object_id, status
            FROM relationships
            WHERE subject_id = $1 OR object_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }
}
