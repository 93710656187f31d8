//! Pager integration tests over the in-memory stores.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use feed_engine::config::{FeedConfig, RerankerConfig};
use feed_engine::domain::{FeedMode, Post, Relationship, RelationshipStatus, ViewerContext};
use feed_engine::error::FeedError;
use feed_engine::repository::memory::{
    MemPostStore, MemRelationshipStore, MemViewStore,
};
use feed_engine::repository::{PostStore, ViewStore};
use feed_engine::services::reranker::{NoopReranker, RerankError, Reranker};
use feed_engine::services::FeedService;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Fixture {
    relationships: Arc<MemRelationshipStore>,
    posts: Arc<MemPostStore>,
    views: Arc<MemViewStore>,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        Self {
            relationships: Arc::new(MemRelationshipStore::new()),
            posts: Arc::new(MemPostStore::new()),
            views: Arc::new(MemViewStore::new()),
        }
    }

    fn service(&self, page_size: usize, reranker: Arc<dyn Reranker>) -> FeedService {
        FeedService::new(
            self.relationships.clone(),
            self.posts.clone(),
            self.views.clone(),
            reranker,
            FeedConfig {
                page_size,
                seen_set_limit: 500,
            },
            &RerankerConfig::default(),
        )
    }

    fn befriend(&self, viewer: Uuid, friend: Uuid) {
        self.relationships.add_edge(Relationship {
            subject_id: viewer,
            object_id: friend,
            status: RelationshipStatus::Accepted,
        });
    }

    async fn add_post(&self, author: Uuid, created_at: DateTime<Utc>, reactions: i64) -> Uuid {
        let post = Post {
            id: Uuid::new_v4(),
            author_id: author,
            created_at,
            caption: "pair".to_string(),
            media_refs: vec!["front.jpg".into(), "back.jpg".into()],
            reaction_count: reactions,
            comment_count: 0,
            is_hidden: false,
            is_flagged: false,
        };
        self.posts.insert(&post).await.unwrap();
        post.id
    }
}

/// Reranker that always errors, exercising the whole-batch fallback
struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn rerank(
        &self,
        _ctx: &ViewerContext,
        _candidates: &[Post],
    ) -> Result<HashMap<Uuid, f64>, RerankError> {
        Err(RerankError::Unavailable("boom".to_string()))
    }
}

/// Reranker answering fixed scores
struct FixedReranker(HashMap<Uuid, f64>);

#[async_trait]
impl Reranker for FixedReranker {
    async fn rerank(
        &self,
        _ctx: &ViewerContext,
        _candidates: &[Post],
    ) -> Result<HashMap<Uuid, f64>, RerankError> {
        Ok(self.0.clone())
    }
}

async fn drain_feed(
    service: &FeedService,
    viewer: Option<Uuid>,
    mode: FeedMode,
) -> Vec<Vec<Uuid>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service
            .get_page(viewer, mode, cursor.as_deref())
            .await
            .unwrap();
        pages.push(page.items.iter().map(|p| p.id).collect());
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    pages
}

#[tokio::test]
async fn test_pagination_returns_every_post_exactly_once() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    fx.befriend(viewer, friend);

    let now = Utc::now();
    let mut expected = HashSet::new();
    for i in 0..14 {
        expected.insert(fx.add_post(friend, now - Duration::minutes(i), 0).await);
    }

    let service = fx.service(5, Arc::new(NoopReranker));
    let pages = drain_feed(&service, Some(viewer), FeedMode::Friends).await;

    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].len(), 5);
    assert_eq!(pages[1].len(), 5);
    assert_eq!(pages[2].len(), 4);

    let delivered: Vec<Uuid> = pages.into_iter().flatten().collect();
    let unique: HashSet<Uuid> = delivered.iter().copied().collect();
    assert_eq!(unique.len(), 14);
    assert_eq!(unique, expected);
}

#[tokio::test]
async fn test_posts_sharing_a_boundary_timestamp_are_not_skipped() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    fx.befriend(viewer, friend);

    // Batch imports produce identical created_at values; the cursor's id
    // leg must carry pagination across the tie.
    let stamp = Utc::now();
    let mut expected = HashSet::new();
    expected.insert(fx.add_post(friend, stamp, 0).await);
    expected.insert(fx.add_post(friend, stamp, 0).await);
    expected.insert(fx.add_post(friend, stamp, 0).await);
    expected.insert(fx.add_post(friend, stamp - Duration::minutes(1), 0).await);

    let service = fx.service(1, Arc::new(NoopReranker));
    let pages = drain_feed(&service, Some(viewer), FeedMode::Friends).await;

    let delivered: Vec<Uuid> = pages.into_iter().flatten().collect();
    assert_eq!(delivered.len(), 4);
    let unique: HashSet<Uuid> = delivered.into_iter().collect();
    assert_eq!(unique, expected);
}

#[tokio::test]
async fn test_subsequent_pages_stay_chronological() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    fx.befriend(viewer, friend);

    let now = Utc::now();
    let mut chronological = Vec::new();
    for i in 0..12 {
        // High reaction counts on old posts must not reorder later pages
        let id = fx
            .add_post(friend, now - Duration::minutes(i), (i * 100) as i64)
            .await;
        chronological.push(id);
    }

    let service = fx.service(5, Arc::new(NoopReranker));
    let pages = drain_feed(&service, Some(viewer), FeedMode::Friends).await;

    assert_eq!(pages[1], chronological[5..10].to_vec());
    assert_eq!(pages[2], chronological[10..12].to_vec());
}

#[tokio::test]
async fn test_first_page_unseen_first_then_seen_by_recency() {
    // The §8 worked scenario: 14 visible posts, PAGE_SIZE = 5, the 3
    // unseen among the newest five carry reaction counts [0, 2, 5].
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    fx.befriend(viewer, friend);

    let now = Utc::now();
    let unseen_0 = fx.add_post(friend, now - Duration::minutes(1), 0).await;
    let unseen_2 = fx.add_post(friend, now - Duration::minutes(2), 2).await;
    let unseen_5 = fx.add_post(friend, now - Duration::minutes(3), 5).await;
    let seen_a = fx.add_post(friend, now - Duration::minutes(4), 0).await;
    let seen_b = fx.add_post(friend, now - Duration::minutes(5), 0).await;
    let mut older = Vec::new();
    for i in 6..15 {
        older.push(fx.add_post(friend, now - Duration::minutes(i), 0).await);
    }

    for id in [seen_a, seen_b].iter().chain(older.iter()) {
        fx.views.insert_view(viewer, *id).await.unwrap();
    }

    let service = fx.service(5, Arc::new(NoopReranker));
    let page = service
        .get_page(Some(viewer), FeedMode::Friends, None)
        .await
        .unwrap();

    let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
    // Unseen first, highest reaction count first; minutes-apart recency
    // differences are far below one reaction's weight
    assert_eq!(ids, vec![unseen_5, unseen_2, unseen_0, seen_a, seen_b]);

    // Cursor points at the 5th chronological item, so page two resumes
    // below it
    let next = service
        .get_page(Some(viewer), FeedMode::Friends, page.next_cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(next.items[0].id, older[0]);
}

#[tokio::test]
async fn test_fallback_order_matches_pure_engagement_scoring() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    fx.befriend(viewer, friend);

    let now = Utc::now();
    for i in 0..8 {
        fx.add_post(friend, now - Duration::hours(i), (i % 4) as i64 * 7)
            .await;
    }

    let broken = fx.service(10, Arc::new(FailingReranker));
    let disabled = fx.service(10, Arc::new(NoopReranker));

    let with_failure = broken
        .get_page(Some(viewer), FeedMode::Friends, None)
        .await
        .unwrap();
    let baseline = disabled
        .get_page(Some(viewer), FeedMode::Friends, None)
        .await
        .unwrap();

    let order_a: Vec<Uuid> = with_failure.items.iter().map(|p| p.id).collect();
    let order_b: Vec<Uuid> = baseline.items.iter().map(|p| p.id).collect();
    assert_eq!(order_a, order_b);
}

#[tokio::test]
async fn test_reranker_scores_reorder_unseen_only() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let friend = Uuid::new_v4();
    fx.befriend(viewer, friend);

    let now = Utc::now();
    let popular = fx.add_post(friend, now - Duration::minutes(1), 40).await;
    let quiet = fx.add_post(friend, now - Duration::minutes(2), 0).await;
    let seen = fx.add_post(friend, now - Duration::minutes(3), 99).await;
    fx.views.insert_view(viewer, seen).await.unwrap();

    // The external service prefers the quiet post
    let scores = HashMap::from([(quiet, 90.0), (popular, 10.0)]);
    let service = fx.service(5, Arc::new(FixedReranker(scores)));

    let page = service
        .get_page(Some(viewer), FeedMode::Friends, None)
        .await
        .unwrap();
    let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
    // AI order wins within the unseen group; the seen post stays last
    // despite its huge reaction count
    assert_eq!(ids, vec![quiet, popular, seen]);
}

#[tokio::test]
async fn test_blocked_author_is_excluded_in_global_mode() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let blocker = Uuid::new_v4();
    fx.relationships.add_edge(Relationship {
        subject_id: blocker,
        object_id: viewer,
        status: RelationshipStatus::Blocked,
    });

    let now = Utc::now();
    let visible = fx.add_post(stranger, now - Duration::minutes(1), 0).await;
    fx.add_post(blocker, now - Duration::minutes(2), 0).await;

    let service = fx.service(10, Arc::new(NoopReranker));
    let page = service
        .get_page(Some(viewer), FeedMode::Global, None)
        .await
        .unwrap();

    let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![visible]);
}

#[tokio::test]
async fn test_hidden_posts_never_surface() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let author = Uuid::new_v4();

    let hidden = Post {
        id: Uuid::new_v4(),
        author_id: author,
        created_at: Utc::now(),
        caption: "hidden".to_string(),
        media_refs: vec!["a.jpg".into(), "b.jpg".into()],
        reaction_count: 0,
        comment_count: 0,
        is_hidden: true,
        is_flagged: true,
    };
    fx.posts.insert(&hidden).await.unwrap();

    let service = fx.service(10, Arc::new(NoopReranker));
    let page = service
        .get_page(Some(viewer), FeedMode::Global, None)
        .await
        .unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_relationship_store_outage_is_a_hard_error() {
    let fx = Fixture::new();
    fx.relationships.set_failing(true);

    let service = fx.service(5, Arc::new(NoopReranker));
    let result = service
        .get_page(Some(Uuid::new_v4()), FeedMode::Friends, None)
        .await;

    assert!(matches!(result, Err(FeedError::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_anonymous_global_browsing_is_allowed() {
    let fx = Fixture::new();
    let author = Uuid::new_v4();
    fx.add_post(author, Utc::now(), 3).await;

    let service = fx.service(5, Arc::new(NoopReranker));
    let page = service.get_page(None, FeedMode::Global, None).await.unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn test_anonymous_friends_feed_requires_identity() {
    let fx = Fixture::new();
    let service = fx.service(5, Arc::new(NoopReranker));

    let result = service.get_page(None, FeedMode::Friends, None).await;
    assert!(matches!(result, Err(FeedError::NotAuthenticated)));
}

#[tokio::test]
async fn test_friends_mode_for_new_user_shows_own_posts_only() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let now = Utc::now();
    let own = fx.add_post(viewer, now - Duration::minutes(1), 0).await;
    fx.add_post(stranger, now - Duration::minutes(2), 0).await;

    let service = fx.service(10, Arc::new(NoopReranker));
    let page = service
        .get_page(Some(viewer), FeedMode::Friends, None)
        .await
        .unwrap();

    let ids: Vec<Uuid> = page.items.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![own]);
}

#[tokio::test]
async fn test_bad_cursor_is_invalid_input() {
    let fx = Fixture::new();
    let service = fx.service(5, Arc::new(NoopReranker));

    let result = service
        .get_page(Some(Uuid::new_v4()), FeedMode::Global, Some("@@garbage@@"))
        .await;
    assert!(matches!(result, Err(FeedError::InvalidInput(_))));
}

#[tokio::test]
async fn test_mark_seen_via_service_is_idempotent() {
    let fx = Fixture::new();
    let viewer = Uuid::new_v4();
    let author = Uuid::new_v4();
    let post = fx.add_post(author, Utc::now(), 0).await;

    let service = fx.service(5, Arc::new(NoopReranker));
    service.mark_seen(viewer, post).await.unwrap();
    service.mark_seen(viewer, post).await.unwrap();

    assert_eq!(fx.posts.view_count(post), 1);
}
