/// Configuration management for the feed engine
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Feed paging configuration
    pub feed: FeedConfig,
    /// External reranking service configuration
    pub reranker: RerankerConfig,
    /// External content classifier configuration
    pub moderation: ModerationConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Feed paging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Number of posts per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Upper bound on the advisory seen-set warmed per page request
    #[serde(default = "default_seen_set_limit")]
    pub seen_set_limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            seen_set_limit: default_seen_set_limit(),
        }
    }
}

/// External relevance-scoring service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Scoring endpoint; empty disables the external call entirely
    #[serde(default)]
    pub endpoint: String,
    /// Hard timeout for the scoring call
    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,
    /// Max candidates sent per call
    #[serde(default = "default_rerank_batch")]
    pub batch_size: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_ms: default_rerank_timeout_ms(),
            batch_size: default_rerank_batch(),
        }
    }
}

/// External content classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Classifier endpoint; empty disables the image check (text rules still apply)
    #[serde(default)]
    pub classifier_endpoint: String,
    /// Hard timeout for the classifier call
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            classifier_endpoint: String::new(),
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

// Default values
fn default_max_connections() -> u32 {
    10
}

fn default_page_size() -> usize {
    20
}

fn default_seen_set_limit() -> usize {
    500
}

fn default_rerank_timeout_ms() -> u64 {
    1500
}

fn default_rerank_batch() -> usize {
    20
}

fn default_classifier_timeout_ms() -> u64 {
    2000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_connections),
        };

        let feed = FeedConfig {
            page_size: std::env::var("FEED_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_page_size),
            seen_set_limit: std::env::var("FEED_SEEN_SET_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_seen_set_limit),
        };

        let reranker = RerankerConfig {
            endpoint: std::env::var("RERANKER_ENDPOINT").unwrap_or_default(),
            timeout_ms: std::env::var("RERANKER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rerank_timeout_ms),
            batch_size: std::env::var("RERANKER_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rerank_batch),
        };

        let moderation = ModerationConfig {
            classifier_endpoint: std::env::var("MODERATION_CLASSIFIER_ENDPOINT")
                .unwrap_or_default(),
            timeout_ms: std::env::var("MODERATION_CLASSIFIER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_classifier_timeout_ms),
        };

        Ok(Self {
            database,
            feed,
            reranker,
            moderation,
        })
    }
}
