use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::PostStore;
use crate::domain::{FeedCursor, Post};
use crate::error::Result;

const POST_COLUMNS: &str = "id, author_id, created_at, caption, media_refs, \
     reaction_count, comment_count, is_hidden, is_flagged";

/// Postgres-backed post store
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn list_visible(
        &self,
        authors: Option<&[Uuid]>,
        excluded: &[Uuid],
        before: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        // $1 = authors (NULL means unrestricted), $2 = excluded authors,
        // $3/$4 = cursor position (NULL on the first page). The id leg
        // breaks created_at ties so the keyset never skips a row that
        // shares the boundary timestamp.
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE is_hidden = FALSE
              AND ($1::uuid[] IS NULL OR author_id = ANY($1))
              AND author_id != ALL($2)
              AND ($3::timestamptz IS NULL
                   OR created_at < $3
                   OR (created_at = $3 AND id > $4))
            ORDER BY created_at DESC, id ASC
            LIMIT $5
            "#
        );

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(authors)
            .bind(excluded)
            .bind(before.map(|c| c.created_at))
            .bind(before.map(|c| c.post_id))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }

    async fn get(&self, post_id: Uuid) -> Result<Option<Post>> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE id = $1
            "#
        );

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn insert(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts
                (id, author_id, created_at, caption, media_refs,
                 reaction_count, comment_count, is_hidden, is_flagged)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.created_at)
        .bind(&post.caption)
        .bind(&post.media_refs)
        .bind(post.reaction_count)
        .bind(post.comment_count)
        .bind(post.is_hidden)
        .bind(post.is_flagged)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_view_count(&self, post_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET view_count = view_count + 1
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
