use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::CommentStore;
use crate::domain::Comment;
use crate::error::Result;

/// Postgres-backed comment store
#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn insert(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at, like_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.parent_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.like_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, parent_id, content, created_at, like_count
            FROM comments
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, post_id, author_id, parent_id, content, created_at, like_count
            FROM comments
            WHERE post_id = $1 AND is_deleted = FALSE
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn delete_subtree(&self, comment_id: Uuid, author_id: Uuid) -> Result<u64> {
        // One recursive statement removes the node and every descendant;
        // a partial subtree is never observable. The author check applies
        // to the root only, matching the ownership model.
        let result = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM comments
                WHERE id = $1 AND author_id = $2 AND is_deleted = FALSE
                UNION ALL
                SELECT c.id FROM comments c
                JOIN subtree s ON c.parent_id = s.id
                WHERE c.is_deleted = FALSE
            )
            UPDATE comments
            SET is_deleted = TRUE
            WHERE id IN (SELECT id FROM subtree)
            "#,
        )
        .bind(comment_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
