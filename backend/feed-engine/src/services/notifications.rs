//! Outbound fire-and-forget notification events.
//!
//! The engine only emits; delivery, retry, and subscription management
//! belong to the dispatcher behind this trait. Dispatch failures are
//! logged and never propagate into the user-facing request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Events emitted by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    NewReaction {
        recipient_id: Uuid,
        post_id: Uuid,
        summary: String,
    },
    NewComment {
        recipient_id: Uuid,
        post_id: Uuid,
        summary: String,
    },
    ChallengeCompleted {
        recipient_id: Uuid,
        post_id: Uuid,
        summary: String,
    },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Fire-and-forget; implementations must not surface delivery errors
    async fn dispatch(&self, event: NotificationEvent);
}

/// Dispatcher that records events to the log stream only
#[derive(Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, event: NotificationEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = %payload, "notification emitted"),
            Err(_) => info!(?event, "notification emitted"),
        }
    }
}
