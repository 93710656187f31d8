use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A challenge post: a pair of photos published by one author.
///
/// Immutable once created except for the moderation flags; the engine
/// never deletes posts, it soft-hides them via `is_hidden`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub caption: String,
    /// Front/back capture pair; always exactly two refs
    pub media_refs: Vec<String>,
    pub reaction_count: i64,
    pub comment_count: i64,
    pub is_hidden: bool,
    pub is_flagged: bool,
}

/// Status of a directional relationship edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "relationship_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Pending,
    Accepted,
    Blocked,
}

/// Directional relationship edge between two users.
///
/// "Friends" is the symmetric closure of `Accepted` edges in either
/// direction; `Blocked` excludes the other party bidirectionally
/// regardless of which side stored the edge.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Relationship {
    pub subject_id: Uuid,
    pub object_id: Uuid,
    pub status: RelationshipStatus,
}

impl Relationship {
    /// The party on the edge that is not `user_id`
    pub fn other_party(&self, user_id: Uuid) -> Uuid {
        if self.subject_id == user_id {
            self.object_id
        } else {
            self.subject_id
        }
    }
}

/// First-view record, unique per (viewer, post) pair
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ViewRecord {
    pub viewer_id: Uuid,
    pub post_id: Uuid,
    pub first_seen_at: DateTime<Utc>,
}

/// Comment entity; forms a tree rooted at `parent_id = None`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
}

/// Feed visibility mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    Friends,
    Global,
}

/// One delivered page of posts plus the token for the next page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<Post>,
    /// Opaque cursor; `None` when the feed is exhausted
    pub next_cursor: Option<String>,
}

/// Draft content submitted for publication or commenting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftContent {
    pub text: Option<String>,
    pub image_ref: Option<String>,
}

/// A new post awaiting moderation and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDraft {
    pub caption: String,
    pub media_refs: Vec<String>,
}

/// Viewer-side context forwarded to the external relevance scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerContext {
    pub viewer_id: Uuid,
    pub mode: FeedMode,
}
