//! View-state tracking: which posts has a viewer already seen.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::repository::{PostStore, ViewStore};

/// Bounded, advisory seen-post membership warmed once per page request.
///
/// A coarse cache of the viewer's most recent view records: a miss
/// (re-showing a seen post after a cold start) is tolerable, but the set
/// never claims a post was seen unless its record was actually loaded,
/// so an unseen post is never hidden.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    ids: HashSet<Uuid>,
}

impl SeenSet {
    pub fn contains(&self, post_id: Uuid) -> bool {
        self.ids.contains(&post_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<Uuid> for SeenSet {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

pub struct ViewTracker {
    views: Arc<dyn ViewStore>,
    posts: Arc<dyn PostStore>,
}

impl ViewTracker {
    pub fn new(views: Arc<dyn ViewStore>, posts: Arc<dyn PostStore>) -> Self {
        Self { views, posts }
    }

    /// Record that the viewer has seen the post.
    ///
    /// Idempotent and safe to call concurrently for the same pair: the
    /// store's unique-pair insert decides a single winner, and only that
    /// winner increments the post's view count. Every later call is a
    /// no-op for counting purposes.
    pub async fn mark_seen(&self, viewer_id: Uuid, post_id: Uuid) -> Result<()> {
        let created = self.views.insert_view(viewer_id, post_id).await?;
        if created {
            self.posts.increment_view_count(post_id).await?;
            debug!(viewer = %viewer_id, post = %post_id, "first view recorded");
        }
        Ok(())
    }

    pub async fn is_seen(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        self.views.is_seen(viewer_id, post_id).await
    }

    /// Warm a bounded seen set for a page request.
    pub async fn load_seen_set(&self, viewer_id: Uuid, limit: usize) -> Result<SeenSet> {
        let ids = self.views.load_seen(viewer_id, limit).await?;
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{MemPostStore, MemViewStore};

    fn tracker() -> (ViewTracker, Arc<MemViewStore>, Arc<MemPostStore>) {
        let views = Arc::new(MemViewStore::new());
        let posts = Arc::new(MemPostStore::new());
        (
            ViewTracker::new(views.clone(), posts.clone()),
            views,
            posts,
        )
    }

    #[tokio::test]
    async fn test_mark_seen_is_idempotent() {
        let (tracker, views, posts) = tracker();
        let viewer = Uuid::new_v4();
        let post = Uuid::new_v4();

        tracker.mark_seen(viewer, post).await.unwrap();
        tracker.mark_seen(viewer, post).await.unwrap();
        tracker.mark_seen(viewer, post).await.unwrap();

        assert!(tracker.is_seen(viewer, post).await.unwrap());
        assert_eq!(views.record_count(), 1);
        // Exactly one downstream increment for the pair's lifetime
        assert_eq!(posts.view_count(post), 1);
    }

    #[tokio::test]
    async fn test_distinct_viewers_count_separately() {
        let (tracker, _views, posts) = tracker();
        let post = Uuid::new_v4();

        tracker.mark_seen(Uuid::new_v4(), post).await.unwrap();
        tracker.mark_seen(Uuid::new_v4(), post).await.unwrap();

        assert_eq!(posts.view_count(post), 2);
    }

    #[tokio::test]
    async fn test_seen_set_is_bounded() {
        let (tracker, _views, _posts) = tracker();
        let viewer = Uuid::new_v4();

        for _ in 0..10 {
            tracker.mark_seen(viewer, Uuid::new_v4()).await.unwrap();
        }

        let seen = tracker.load_seen_set(viewer, 4).await.unwrap();
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn test_unloaded_post_is_not_seen() {
        let (tracker, _views, _posts) = tracker();
        let viewer = Uuid::new_v4();
        let seen = tracker.load_seen_set(viewer, 100).await.unwrap();
        // No false positives: an empty warm set hides nothing
        assert!(!seen.contains(Uuid::new_v4()));
    }
}
