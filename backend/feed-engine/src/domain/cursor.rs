//! Opaque cursor for keyset feed pagination.
//!
//! Encodes as base64 of `"<created_at_micros>:<post_id>"`. The
//! (timestamp, post id) position strictly advances across successive
//! pages — the id breaks timestamp ties — so no item is skipped or
//! duplicated while paging; posts inserted after the cursor's reference
//! point are the documented append-while-paging exception.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{FeedError, Result};

/// Cursor pointing just below the last delivered item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub post_id: Uuid,
}

impl FeedCursor {
    /// Cursor for the boundary item of a page
    pub fn after(created_at: DateTime<Utc>, post_id: Uuid) -> Self {
        Self {
            created_at,
            post_id,
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.created_at.timestamp_micros(),
            self.post_id
        );
        general_purpose::STANDARD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let decoded = general_purpose::STANDARD
            .decode(token)
            .map_err(|_| FeedError::InvalidInput("Invalid cursor format".to_string()))?;
        let raw = String::from_utf8(decoded)
            .map_err(|_| FeedError::InvalidInput("Invalid cursor encoding".to_string()))?;

        let (ts_str, id_str) = raw
            .split_once(':')
            .ok_or_else(|| FeedError::InvalidInput("Invalid cursor shape".to_string()))?;

        let micros = ts_str
            .parse::<i64>()
            .map_err(|_| FeedError::InvalidInput("Invalid cursor timestamp".to_string()))?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| FeedError::InvalidInput("Cursor timestamp out of range".to_string()))?;
        let post_id = Uuid::parse_str(id_str)
            .map_err(|_| FeedError::InvalidInput("Invalid cursor post id".to_string()))?;

        Ok(Self {
            created_at,
            post_id,
        })
    }
}
