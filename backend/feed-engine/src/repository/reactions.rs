use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ReactionStore, ReactionToggle};
use crate::error::Result;

/// Postgres-backed reaction store
#[derive(Clone)]
pub struct PgReactionStore {
    pool: PgPool,
}

impl PgReactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReactionStore for PgReactionStore {
    async fn toggle(&self, post_id: Uuid, user_id: Uuid, emoji: &str) -> Result<ReactionToggle> {
        // Delete-else-insert and the counter move in one statement, so
        // concurrent toggles for the same triple serialize inside Postgres
        // and a failure leaves the reaction row and the denormalized count
        // both untouched.
        let (added, reaction_count): (bool, i64) = sqlx::query_as(
            r#"
            WITH removed AS (
                DELETE FROM reactions
                WHERE post_id = $1 AND user_id = $2 AND emoji = $3
                RETURNING 1
            ),
            inserted AS (
                INSERT INTO reactions (post_id, user_id, emoji)
                SELECT $1, $2, $3
                WHERE NOT EXISTS (SELECT 1 FROM removed)
                RETURNING 1
            ),
            counted AS (
                UPDATE posts
                SET reaction_count = GREATEST(
                        reaction_count
                            + (SELECT count(*) FROM inserted)
                            - (SELECT count(*) FROM removed),
                        0)
                WHERE id = $1
                RETURNING reaction_count
            )
            SELECT EXISTS (SELECT 1 FROM inserted),
                   (SELECT reaction_count FROM counted)
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReactionToggle {
            added,
            reaction_count,
        })
    }

    async fn exists(&self, post_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reactions
                WHERE post_id = $1 AND user_id = $2 AND emoji = $3
            )
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
