//! Feed pager: the central orchestrator.
//!
//! A page request flows graph filter → candidate query → seen/unseen
//! classification → baseline scoring → optional AI rerank → page + cursor.
//! Re-ranking is a first-page-only experience optimization; subsequent
//! pages keep raw chronological order so forward progress is monotonic
//! and nothing already delivered re-surfaces.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{FeedConfig, RerankerConfig};
use crate::domain::{FeedCursor, FeedMode, FeedPage, Post, ViewerContext};
use crate::error::{FeedError, Result};
use crate::repository::{PostStore, RelationshipStore, ViewStore};
use crate::services::reranker::Reranker;
use crate::services::scoring::{compare_scored, engagement_score};
use crate::services::view_tracker::ViewTracker;
use crate::services::visibility::{VisibilityResolver, VisibilitySet};

pub struct FeedService {
    visibility: VisibilityResolver,
    posts: Arc<dyn PostStore>,
    tracker: ViewTracker,
    reranker: Arc<dyn Reranker>,
    page_size: usize,
    seen_set_limit: usize,
    rerank_batch: usize,
}

impl FeedService {
    pub fn new(
        relationships: Arc<dyn RelationshipStore>,
        posts: Arc<dyn PostStore>,
        views: Arc<dyn ViewStore>,
        reranker: Arc<dyn Reranker>,
        feed: FeedConfig,
        rerank: &RerankerConfig,
    ) -> Self {
        Self {
            visibility: VisibilityResolver::new(relationships),
            tracker: ViewTracker::new(views, posts.clone()),
            posts,
            reranker,
            page_size: feed.page_size.max(1),
            seen_set_limit: feed.seen_set_limit,
            rerank_batch: rerank.batch_size.max(1),
        }
    }

    /// Deliver one page of the viewer's feed.
    ///
    /// `viewer = None` is anonymous browsing: allowed for the global feed
    /// (chronological candidates, baseline scoring, no personalization),
    /// rejected for the friends feed.
    pub async fn get_page(
        &self,
        viewer: Option<Uuid>,
        mode: FeedMode,
        cursor: Option<&str>,
    ) -> Result<FeedPage> {
        // Step 1: resolve visibility; a store failure is fatal for the
        // request, never downgraded to an empty friend set.
        let visibility = match viewer {
            Some(viewer_id) => self.visibility.resolve(viewer_id, mode).await?,
            None if mode == FeedMode::Global => VisibilityResolver::anonymous(),
            None => return Err(FeedError::NotAuthenticated),
        };

        let cursor = cursor.map(FeedCursor::decode).transpose()?;

        // Step 2: candidates ordered by created_at desc, one extra row to
        // detect whether another page exists.
        let mut items = self.fetch_candidates(&visibility, cursor).await?;

        // Step 3: boundary cursor from the chronological order, before any
        // first-page reordering.
        let next_cursor = if items.len() > self.page_size {
            items.truncate(self.page_size);
            items
                .last()
                .map(|boundary| FeedCursor::after(boundary.created_at, boundary.id).encode())
        } else {
            None
        };

        // Steps 4-5: rank the first page; keep later pages chronological.
        let items = if cursor.is_none() {
            self.rank_first_page(viewer, mode, items).await?
        } else {
            items
        };

        Ok(FeedPage { items, next_cursor })
    }

    /// Record a delivered post as seen; idempotent per (viewer, post).
    pub async fn mark_seen(&self, viewer_id: Uuid, post_id: Uuid) -> Result<()> {
        self.tracker.mark_seen(viewer_id, post_id).await
    }

    async fn fetch_candidates(
        &self,
        visibility: &VisibilitySet,
        cursor: Option<FeedCursor>,
    ) -> Result<Vec<Post>> {
        let included: Option<Vec<Uuid>> = visibility
            .included
            .as_ref()
            .map(|set| set.iter().copied().collect());
        let excluded: Vec<Uuid> = visibility.excluded.iter().copied().collect();

        self.posts
            .list_visible(included.as_deref(), &excluded, cursor, self.page_size + 1)
            .await
    }

    /// First-page ordering: unseen before seen, each sub-group by score
    /// descending with the deterministic tie-break. Scores come from the
    /// external reranker when it answers, else from the shared baseline.
    async fn rank_first_page(
        &self,
        viewer: Option<Uuid>,
        mode: FeedMode,
        items: Vec<Post>,
    ) -> Result<Vec<Post>> {
        let now = Utc::now();

        let Some(viewer_id) = viewer else {
            // Anonymous: single group, baseline only
            let mut scored: Vec<(Post, f64)> = items
                .into_iter()
                .map(|p| {
                    let score = engagement_score(&p, now);
                    (p, score)
                })
                .collect();
            scored.sort_by(compare_scored);
            return Ok(scored.into_iter().map(|(p, _)| p).collect());
        };

        let seen = self
            .tracker
            .load_seen_set(viewer_id, self.seen_set_limit)
            .await?;

        let (unseen, seen_items): (Vec<Post>, Vec<Post>) =
            items.into_iter().partition(|p| !seen.contains(p.id));

        let ai_scores = self.rerank_unseen(viewer_id, mode, &unseen, now).await;

        let mut ranked: Vec<(Post, f64)> = unseen
            .into_iter()
            .map(|p| {
                let score = ai_scores
                    .get(&p.id)
                    .copied()
                    .unwrap_or_else(|| engagement_score(&p, now));
                (p, score)
            })
            .collect();
        ranked.sort_by(compare_scored);

        let mut seen_scored: Vec<(Post, f64)> = seen_items
            .into_iter()
            .map(|p| {
                let score = engagement_score(&p, now);
                (p, score)
            })
            .collect();
        seen_scored.sort_by(compare_scored);

        ranked.extend(seen_scored);
        Ok(ranked.into_iter().map(|(p, _)| p).collect())
    }

    /// One bounded reranker call for the top unseen candidates. Advisory:
    /// every failure path returns an empty map so baseline scores apply to
    /// the entire batch, which keeps fallback ordering identical to the
    /// pure engagement scorer.
    async fn rerank_unseen(
        &self,
        viewer_id: Uuid,
        mode: FeedMode,
        unseen: &[Post],
        now: chrono::DateTime<chrono::Utc>,
    ) -> HashMap<Uuid, f64> {
        if unseen.is_empty() {
            return HashMap::new();
        }

        // Cap external call cost: top of the baseline order only
        let mut batch: Vec<(Post, f64)> = unseen
            .iter()
            .cloned()
            .map(|p| {
                let score = engagement_score(&p, now);
                (p, score)
            })
            .collect();
        batch.sort_by(compare_scored);
        let batch: Vec<Post> = batch
            .into_iter()
            .take(self.rerank_batch)
            .map(|(p, _)| p)
            .collect();

        let ctx = ViewerContext { viewer_id, mode };
        match self.reranker.rerank(&ctx, &batch).await {
            Ok(scores) => {
                debug!(
                    candidates = batch.len(),
                    scored = scores.len(),
                    "reranker answered"
                );
                scores
            }
            Err(e) => {
                warn!(error = %e, "reranker unavailable, using baseline scores");
                HashMap::new()
            }
        }
    }
}
