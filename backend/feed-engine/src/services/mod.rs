pub mod engagement;
pub mod feed;
pub mod moderation;
pub mod notifications;
pub mod publish;
pub mod reranker;
pub mod scoring;
pub mod view_tracker;
pub mod visibility;

pub use engagement::{build_comment_tree, CommentNode, EngagementService};
pub use feed::FeedService;
pub use moderation::{ImageClassifier, ModerationGate, ModerationMode, ModerationVerdict};
pub use notifications::{LogDispatcher, NotificationDispatcher, NotificationEvent};
pub use publish::PublishService;
pub use reranker::{HttpReranker, NoopReranker, Reranker};
pub use scoring::engagement_score;
pub use view_tracker::{SeenSet, ViewTracker};
pub use visibility::{VisibilityResolver, VisibilitySet};
