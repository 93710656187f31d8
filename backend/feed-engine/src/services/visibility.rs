//! Graph filter: resolves which authors a viewer may see.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{FeedMode, RelationshipStatus};
use crate::error::Result;
use crate::repository::RelationshipStore;

/// Author sets a page request is restricted to.
#[derive(Debug, Clone)]
pub struct VisibilitySet {
    /// Authors to include; `None` means no restriction (global mode)
    pub included: Option<HashSet<Uuid>>,
    /// Authors excluded by a blocked edge in either direction
    pub excluded: HashSet<Uuid>,
}

pub struct VisibilityResolver {
    relationships: Arc<dyn RelationshipStore>,
}

impl VisibilityResolver {
    pub fn new(relationships: Arc<dyn RelationshipStore>) -> Self {
        Self { relationships }
    }

    /// Resolve the allowed/blocked author sets for one viewer.
    ///
    /// A store failure propagates as `StoreUnavailable`; an unreachable
    /// relationship store must never be silently treated as "no friends".
    pub async fn resolve(&self, viewer_id: Uuid, mode: FeedMode) -> Result<VisibilitySet> {
        let edges = self.relationships.edges_touching(viewer_id).await?;

        let mut excluded = HashSet::new();
        let mut friends = HashSet::new();
        friends.insert(viewer_id);

        for edge in &edges {
            let other = edge.other_party(viewer_id);
            match edge.status {
                // Blocked cuts both ways regardless of which side stored it
                RelationshipStatus::Blocked => {
                    excluded.insert(other);
                }
                RelationshipStatus::Accepted => {
                    friends.insert(other);
                }
                RelationshipStatus::Pending => {}
            }
        }

        // A blocked edge wins over an accepted one for the same pair
        friends.retain(|id| *id == viewer_id || !excluded.contains(id));

        let included = match mode {
            FeedMode::Friends => Some(friends),
            FeedMode::Global => None,
        };

        debug!(
            viewer = %viewer_id,
            edges = edges.len(),
            excluded = excluded.len(),
            "resolved visibility set"
        );

        Ok(VisibilitySet { included, excluded })
    }

    /// Visibility for anonymous global browsing: nothing included or
    /// excluded beyond moderation hiding, which the post store applies.
    pub fn anonymous() -> VisibilitySet {
        VisibilitySet {
            included: None,
            excluded: HashSet::new(),
        }
    }
}
