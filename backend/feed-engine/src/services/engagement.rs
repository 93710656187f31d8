//! Reaction and comment state machine.
//!
//! Reactions apply optimistically to a local ledger before the store
//! acknowledges; a store error rolls the ledger back, a store answer
//! reconciles it. Comments pass the moderation gate (text-only) before
//! anything is persisted or appended to local tree state.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Comment, DraftContent};
use crate::error::{FeedError, Result};
use crate::repository::{CommentStore, PostStore, ReactionStore, ReactionToggle};
use crate::services::moderation::{ModerationGate, ModerationMode};
use crate::services::notifications::{NotificationDispatcher, NotificationEvent};

/// A comment with its nested replies
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

pub struct EngagementService {
    reactions: Arc<dyn ReactionStore>,
    comments: Arc<dyn CommentStore>,
    posts: Arc<dyn PostStore>,
    moderation: Arc<ModerationGate>,
    notifier: Arc<dyn NotificationDispatcher>,
    /// Optimistic reacted-state per (user, post, emoji); advisory, never a
    /// source of truth — reconciled to the store's answer on every toggle
    ledger: DashMap<(Uuid, Uuid, String), bool>,
}

impl EngagementService {
    pub fn new(
        reactions: Arc<dyn ReactionStore>,
        comments: Arc<dyn CommentStore>,
        posts: Arc<dyn PostStore>,
        moderation: Arc<ModerationGate>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            reactions,
            comments,
            posts,
            moderation,
            notifier,
            ledger: DashMap::new(),
        }
    }

    /// Whether the optimistic ledger currently shows the user as reacted.
    /// Falls back to the store when the ledger has no entry.
    pub async fn has_reacted(&self, user_id: Uuid, post_id: Uuid, emoji: &str) -> Result<bool> {
        let key = (user_id, post_id, emoji.to_string());
        if let Some(entry) = self.ledger.get(&key) {
            return Ok(*entry);
        }
        self.reactions.exists(post_id, user_id, emoji).await
    }

    /// Toggle the (user, post, emoji) reaction.
    ///
    /// The local ledger flips before the store round trip; on store error
    /// the flip is rolled back and the error surfaces, on success the
    /// ledger reconciles to whatever the store decided (a concurrent
    /// toggle may have won).
    pub async fn toggle_reaction(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        emoji: &str,
    ) -> Result<ReactionToggle> {
        let key = (user_id, post_id, emoji.to_string());
        let before = match self.ledger.get(&key) {
            Some(entry) => *entry,
            None => self.reactions.exists(post_id, user_id, emoji).await?,
        };

        // Optimistic flip
        self.ledger.insert(key.clone(), !before);

        let result = match self.reactions.toggle(post_id, user_id, emoji).await {
            Ok(result) => result,
            Err(e) => {
                // Rollback: the flip never happened
                self.ledger.insert(key, before);
                return Err(e);
            }
        };

        // Reconcile to the server's answer
        self.ledger.insert(key, result.added);

        if result.added {
            if let Some(post) = self.posts.get(post_id).await? {
                if post.author_id != user_id {
                    self.notifier
                        .dispatch(NotificationEvent::NewReaction {
                            recipient_id: post.author_id,
                            post_id,
                            summary: format!("Someone reacted {} to your post", emoji),
                        })
                        .await;
                }
            }
        }

        debug!(
            user = %user_id,
            post = %post_id,
            emoji,
            added = result.added,
            "reaction toggled"
        );
        Ok(result)
    }

    /// Add a comment after a text-only moderation pass. Rejected content
    /// is never persisted and never reaches local tree state.
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: String,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(FeedError::InvalidInput("Comment is empty".to_string()));
        }

        let draft = DraftContent {
            text: Some(content.clone()),
            image_ref: None,
        };
        let verdict = self.moderation.check(&draft, ModerationMode::TextOnly).await;
        if !verdict.clean {
            return Err(FeedError::ContentFlagged {
                category: verdict.category,
                confidence: verdict.confidence,
            });
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            parent_id,
            content,
            created_at: Utc::now(),
            like_count: 0,
        };
        self.comments.insert(&comment).await?;

        if let Some(post) = self.posts.get(post_id).await? {
            if post.author_id != author_id {
                self.notifier
                    .dispatch(NotificationEvent::NewComment {
                        recipient_id: post.author_id,
                        post_id,
                        summary: "New comment on your post".to_string(),
                    })
                    .await;
            }
        }

        Ok(comment)
    }

    /// Full comment tree for a post, roots oldest-first.
    pub async fn comment_tree(&self, post_id: Uuid) -> Result<Vec<CommentNode>> {
        let rows = self.comments.list_for_post(post_id).await?;
        Ok(build_comment_tree(rows))
    }

    /// Delete a comment and its entire reply subtree. Only the comment's
    /// author may delete it; partial subtree removal is not possible.
    pub async fn delete_comment(&self, comment_id: Uuid, requester_id: Uuid) -> Result<u64> {
        let removed = self.comments.delete_subtree(comment_id, requester_id).await?;
        if removed == 0 {
            return Err(FeedError::NotFound(format!(
                "Comment {} not found or not owned by requester",
                comment_id
            )));
        }
        Ok(removed)
    }
}

/// Reconstruct the reply tree from flat rows.
///
/// Each comment attaches to its parent's reply list; a comment whose
/// parent is missing (deleted, not loaded) demotes to a root rather than
/// being dropped.
pub fn build_comment_tree(rows: Vec<Comment>) -> Vec<CommentNode> {
    use std::collections::{HashMap, HashSet};

    let known: HashSet<Uuid> = rows.iter().map(|c| c.id).collect();

    // Group children under their effective parent, preserving input order
    let mut children: HashMap<Option<Uuid>, Vec<Comment>> = HashMap::new();
    for comment in rows {
        let parent = match comment.parent_id {
            Some(p) if known.contains(&p) => Some(p),
            _ => None,
        };
        children.entry(parent).or_default().push(comment);
    }

    fn attach(
        parent: Option<Uuid>,
        children: &mut std::collections::HashMap<Option<Uuid>, Vec<Comment>>,
    ) -> Vec<CommentNode> {
        let Some(level) = children.remove(&parent) else {
            return Vec::new();
        };
        level
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentNode { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}
