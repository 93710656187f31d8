//! Deterministic engagement scoring.
//!
//! This one function is both the default ranking signal and the fallback
//! used verbatim whenever the external reranker is unavailable; keeping a
//! single implementation makes fallback consistency testable.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::domain::Post;

/// Weight applied to each reaction
pub const WEIGHT_REACTION: f64 = 1.0;

/// Ceiling of the recency term; a brand-new post starts with this head
/// start, so an older post needs roughly this many net reactions to pass
/// it. Keeps both factors in the same numeric decade.
pub const RECENCY_CEILING: f64 = 50.0;

/// Hours for the recency term to fall to half its ceiling
pub const RECENCY_HALF_LIFE_HOURS: f64 = 24.0;

/// Engagement score for a post at time `now`. Pure: no I/O, no clock reads.
pub fn engagement_score(post: &Post, now: DateTime<Utc>) -> f64 {
    let reaction_term = post.reaction_count.max(0) as f64 * WEIGHT_REACTION;
    reaction_term + recency_term(post.created_at, now)
}

/// Recency term: monotonically decreasing in age, bounded by
/// [`RECENCY_CEILING`], halved every [`RECENCY_HALF_LIFE_HOURS`].
pub fn recency_term(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - created_at).num_seconds().max(0) as f64 / 3600.0;
    RECENCY_CEILING / (1.0 + age_hours / RECENCY_HALF_LIFE_HOURS)
}

/// Total order over scored posts: score desc, then `created_at` desc,
/// then id asc. Deterministic for any input, including NaN-free score
/// ties, so ranked pages are reproducible in tests.
pub fn compare_scored(a: &(Post, f64), b: &(Post, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.0.created_at.cmp(&a.0.created_at))
        .then_with(|| a.0.id.cmp(&b.0.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn post_at(created_at: DateTime<Utc>, reaction_count: i64) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            created_at,
            caption: String::new(),
            media_refs: vec!["front.jpg".into(), "back.jpg".into()],
            reaction_count,
            comment_count: 0,
            is_hidden: false,
            is_flagged: false,
        }
    }

    #[test]
    fn test_recency_decays_monotonically() {
        let now = Utc::now();
        let fresh = recency_term(now - Duration::hours(1), now);
        let day_old = recency_term(now - Duration::hours(24), now);
        let week_old = recency_term(now - Duration::hours(168), now);

        assert!(fresh > day_old);
        assert!(day_old > week_old);
        assert!(fresh <= RECENCY_CEILING);
        assert!(week_old > 0.0);
    }

    #[test]
    fn test_recency_is_bounded() {
        let now = Utc::now();
        // A post "from the future" (clock skew) must not exceed the ceiling
        let skewed = recency_term(now + Duration::hours(5), now);
        assert!(skewed <= RECENCY_CEILING);
    }

    #[test]
    fn test_reactions_break_recency_ties() {
        let now = Utc::now();
        let created = now - Duration::hours(3);
        let quiet = post_at(created, 0);
        let popular = post_at(created, 5);

        assert!(engagement_score(&popular, now) > engagement_score(&quiet, now));
    }

    #[test]
    fn test_old_viral_post_needs_ceiling_worth_of_reactions() {
        let now = Utc::now();
        let brand_new = post_at(now, 0);
        let ancient_mild = post_at(now - Duration::days(30), 10);
        let ancient_viral = post_at(now - Duration::days(30), 200);

        assert!(engagement_score(&brand_new, now) > engagement_score(&ancient_mild, now));
        assert!(engagement_score(&ancient_viral, now) > engagement_score(&brand_new, now));
    }

    #[test]
    fn test_score_is_deterministic() {
        let now = Utc::now();
        let post = post_at(now - Duration::hours(7), 3);
        assert_eq!(engagement_score(&post, now), engagement_score(&post, now));
    }

    #[test]
    fn test_compare_scored_total_order() {
        let now = Utc::now();
        let older = post_at(now - Duration::hours(2), 0);
        let newer = post_at(now - Duration::hours(1), 0);

        // Equal scores fall back to created_at desc
        let a = (older.clone(), 10.0);
        let b = (newer.clone(), 10.0);
        assert_eq!(compare_scored(&b, &a), Ordering::Less);

        // Fully identical keys fall back to id asc
        let c = (older.clone(), 10.0);
        let mut d = older.clone();
        d.id = Uuid::new_v4();
        let d = (d, 10.0);
        let expected = c.0.id.cmp(&d.0.id);
        assert_eq!(compare_scored(&c, &d), expected);
    }
}
