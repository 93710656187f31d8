//! Optional external relevance scoring.
//!
//! The reranker is advisory: it reorders already-filtered, already-visible
//! candidates and is never a gate for inclusion. Any failure (timeout,
//! non-2xx, malformed shape) degrades the whole batch to the deterministic
//! engagement score; per-item invalid scores fall back individually.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::config::RerankerConfig;
use crate::domain::{Post, ViewerContext};

/// Accepted score range for external scores
pub const SCORE_MIN: f64 = 1.0;
pub const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("Rerank service unreachable: {0}")]
    Unavailable(String),
    #[error("Rerank response malformed: {0}")]
    Malformed(String),
    #[error("Rerank disabled")]
    Disabled,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score a bounded candidate batch. At most one call per page request;
    /// implementations must apply a hard timeout and never retry.
    async fn rerank(
        &self,
        ctx: &ViewerContext,
        candidates: &[Post],
    ) -> Result<HashMap<Uuid, f64>, RerankError>;
}

/// Reranker that always reports failure, forcing the deterministic
/// fallback path. Used when no endpoint is configured and in tests.
#[derive(Default)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(
        &self,
        _ctx: &ViewerContext,
        _candidates: &[Post],
    ) -> Result<HashMap<Uuid, f64>, RerankError> {
        Err(RerankError::Disabled)
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    viewer_context: &'a ViewerContext,
    candidate_posts: Vec<CandidatePost<'a>>,
}

#[derive(Serialize)]
struct CandidatePost<'a> {
    post_id: Uuid,
    author_id: Uuid,
    caption: &'a str,
    created_at: chrono::DateTime<chrono::Utc>,
    reaction_count: i64,
}

/// HTTP client for the external relevance-scoring service
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReranker {
    pub fn new(config: &RerankerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        ctx: &ViewerContext,
        candidates: &[Post],
    ) -> Result<HashMap<Uuid, f64>, RerankError> {
        if self.endpoint.is_empty() {
            return Err(RerankError::Disabled);
        }

        let request = RerankRequest {
            viewer_context: ctx,
            candidate_posts: candidates
                .iter()
                .map(|p| CandidatePost {
                    post_id: p.id,
                    author_id: p.author_id,
                    caption: &p.caption,
                    created_at: p.created_at,
                    reaction_count: p.reaction_count,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RerankError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RerankError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RerankError::Malformed(e.to_string()))?;

        parse_scores(&body)
    }
}

/// Validate the structured response: the shape must be
/// `{"scores": {"<post_id>": <number>}}` or the whole result is discarded.
/// Individually invalid entries (bad id, non-finite or out-of-range score)
/// are dropped so the caller falls back to baseline for those posts only.
pub fn parse_scores(body: &Value) -> Result<HashMap<Uuid, f64>, RerankError> {
    let scores = body
        .get("scores")
        .ok_or_else(|| RerankError::Malformed("missing scores field".to_string()))?
        .as_object()
        .ok_or_else(|| RerankError::Malformed("scores is not an object".to_string()))?;

    let mut parsed = HashMap::with_capacity(scores.len());
    for (key, value) in scores {
        let Ok(post_id) = Uuid::parse_str(key) else {
            warn!(key = %key, "discarding score with invalid post id");
            continue;
        };
        let Some(score) = value.as_f64() else {
            warn!(post = %post_id, "discarding non-numeric score");
            continue;
        };
        if !score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&score) {
            warn!(post = %post_id, score, "discarding out-of-range score");
            continue;
        }
        parsed.insert(post_id, score);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_scores() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let body = json!({ "scores": { a.to_string(): 72.5, b.to_string(): 1.0 } });

        let scores = parse_scores(&body).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[&a], 72.5);
        assert_eq!(scores[&b], 1.0);
    }

    #[test]
    fn test_missing_scores_field_discards_whole_result() {
        let body = json!({ "rankings": {} });
        assert!(matches!(
            parse_scores(&body),
            Err(RerankError::Malformed(_))
        ));
    }

    #[test]
    fn test_scores_not_an_object_discards_whole_result() {
        let body = json!({ "scores": [1, 2, 3] });
        assert!(matches!(
            parse_scores(&body),
            Err(RerankError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_entries_dropped_individually() {
        let good = Uuid::new_v4();
        let too_big = Uuid::new_v4();
        let too_small = Uuid::new_v4();
        let not_numeric = Uuid::new_v4();
        let body = json!({ "scores": {
            good.to_string(): 55.0,
            too_big.to_string(): 250.0,
            too_small.to_string(): 0.2,
            not_numeric.to_string(): "high",
            "not-a-uuid": 40.0,
        }});

        let scores = parse_scores(&body).unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores.contains_key(&good));
    }

    #[test]
    fn test_non_finite_scores_dropped() {
        let id = Uuid::new_v4();
        // JSON can't carry NaN/inf directly; a null exercises the same path
        let body = json!({ "scores": { id.to_string(): null } });
        let scores = parse_scores(&body).unwrap();
        assert!(scores.is_empty());
    }
}
