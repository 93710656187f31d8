//! Store seams consumed by the engine.
//!
//! Every backing store is reached through one of these traits so the
//! pager and state machines can be exercised without Postgres. The
//! Postgres implementations keep each write a single atomic statement;
//! the engine never holds a multi-step lock across a network call.

pub mod comments;
pub mod memory;
pub mod posts;
pub mod reactions;
pub mod relationships;
pub mod views;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Comment, FeedCursor, Post, Relationship};
use crate::error::Result;

pub use comments::PgCommentStore;
pub use posts::PgPostStore;
pub use reactions::PgReactionStore;
pub use relationships::PgRelationshipStore;
pub use views::PgViewStore;

/// Outcome of an atomic reaction toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionToggle {
    /// True when the toggle inserted the reaction, false when it removed it
    pub added: bool,
    /// Post reaction count after the toggle
    pub reaction_count: i64,
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// All relationship edges touching `user_id`, either direction
    async fn edges_touching(&self, user_id: Uuid) -> Result<Vec<Relationship>>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Visible (non-hidden) posts in `(created_at desc, id asc)` keyset
    /// order, restricted to `authors` when present, excluding `excluded`
    /// authors, at most `limit` rows. When `before` is present only rows
    /// strictly past that position qualify: older timestamps, or the same
    /// timestamp with a greater id, so equal-timestamp rows straddling a
    /// page boundary are never skipped.
    async fn list_visible(
        &self,
        authors: Option<&[Uuid]>,
        excluded: &[Uuid],
        before: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Post>>;

    async fn get(&self, post_id: Uuid) -> Result<Option<Post>>;

    async fn insert(&self, post: &Post) -> Result<()>;

    /// Downstream effect of a first view; at most once per (viewer, post)
    /// pair, enforced by the caller via [`ViewStore::insert_view`].
    async fn increment_view_count(&self, post_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Atomic insert-or-delete for the (post, user, emoji) triple.
    /// A second identical reaction removes the first.
    async fn toggle(&self, post_id: Uuid, user_id: Uuid, emoji: &str) -> Result<ReactionToggle>;

    async fn exists(&self, post_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: &Comment) -> Result<()>;

    async fn get(&self, comment_id: Uuid) -> Result<Option<Comment>>;

    /// All live comments for a post, oldest first
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>>;

    /// Remove the comment and its entire reply subtree in one statement.
    /// Returns the number of comments removed; 0 when the comment does
    /// not exist or `author_id` does not own it.
    async fn delete_subtree(&self, comment_id: Uuid, author_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Insert-or-ignore the (viewer, post) view record. Returns true only
    /// when this call created the record; duplicates are a silent no-op.
    async fn insert_view(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool>;

    async fn is_seen(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool>;

    /// Most recently seen post ids for the viewer, newest first, bounded
    async fn load_seen(&self, viewer_id: Uuid, limit: usize) -> Result<Vec<Uuid>>;
}
