/// Error types for the feed engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    /// A backing store could not be reached or a query failed. Fatal for
    /// the in-flight request; callers never receive a partial page.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// Content was rejected by the moderation gate and was not persisted.
    #[error("Content flagged (category: {category:?}, confidence: {confidence})")]
    ContentFlagged {
        category: Option<String>,
        confidence: f32,
    },

    /// A mutation was attempted without a viewer identity.
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for feed engine operations
pub type Result<T> = std::result::Result<T, FeedError>;
