//! Publication flow: new content clears the moderation gate before it is
//! persisted and becomes visible to the pager.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{DraftContent, Post, PostDraft};
use crate::error::{FeedError, Result};
use crate::repository::PostStore;
use crate::services::moderation::{ModerationGate, ModerationMode};
use crate::services::notifications::{NotificationDispatcher, NotificationEvent};

pub struct PublishService {
    posts: Arc<dyn PostStore>,
    moderation: Arc<ModerationGate>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl PublishService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        moderation: Arc<ModerationGate>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            posts,
            moderation,
            notifier,
        }
    }

    /// Publish a challenge post: exactly two media refs, caption and first
    /// image through the gate, persisted only when clean.
    pub async fn publish_post(&self, author_id: Uuid, draft: PostDraft) -> Result<Post> {
        if draft.media_refs.len() != 2 {
            return Err(FeedError::InvalidInput(format!(
                "A challenge post needs exactly 2 media refs, got {}",
                draft.media_refs.len()
            )));
        }

        let content = DraftContent {
            text: Some(draft.caption.clone()),
            image_ref: draft.media_refs.first().cloned(),
        };
        let verdict = self.moderation.check(&content, ModerationMode::Full).await;
        if !verdict.clean {
            return Err(FeedError::ContentFlagged {
                category: verdict.category,
                confidence: verdict.confidence,
            });
        }

        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            created_at: Utc::now(),
            caption: draft.caption,
            media_refs: draft.media_refs,
            reaction_count: 0,
            comment_count: 0,
            is_hidden: false,
            is_flagged: false,
        };
        self.posts.insert(&post).await?;

        info!(post = %post.id, author = %author_id, confidence = verdict.confidence, "post published");

        self.notifier
            .dispatch(NotificationEvent::ChallengeCompleted {
                recipient_id: author_id,
                post_id: post.id,
                summary: "Challenge completed".to_string(),
            })
            .await;

        Ok(post)
    }
}
