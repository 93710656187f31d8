//! In-memory store implementations.
//!
//! Semantically equivalent to the Postgres stores (atomic toggle,
//! insert-or-ignore views, whole-subtree comment removal) so the pager
//! and state machines can be exercised in tests and local development
//! without a database. Each store can be switched into a failing mode to
//! drive the `StoreUnavailable` paths.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    CommentStore, PostStore, ReactionStore, ReactionToggle, RelationshipStore, ViewStore,
};
use crate::domain::{Comment, FeedCursor, Post, Relationship, ViewRecord};
use crate::error::{FeedError, Result};

fn store_down() -> FeedError {
    FeedError::StoreUnavailable(sqlx::Error::PoolClosed)
}

/// In-memory relationship store
#[derive(Default)]
pub struct MemRelationshipStore {
    edges: Mutex<Vec<Relationship>>,
    failing: AtomicBool,
}

impl MemRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&self, edge: Relationship) {
        self.edges.lock().unwrap().push(edge);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelationshipStore for MemRelationshipStore {
    async fn edges_touching(&self, user_id: Uuid) -> Result<Vec<Relationship>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let edges = self.edges.lock().unwrap();
        Ok(edges
            .iter()
            .filter(|e| e.subject_id == user_id || e.object_id == user_id)
            .cloned()
            .collect())
    }
}

/// In-memory post store
#[derive(Default)]
pub struct MemPostStore {
    posts: Mutex<HashMap<Uuid, Post>>,
    view_counts: Mutex<HashMap<Uuid, i64>>,
    failing: AtomicBool,
}

impl MemPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// View count accumulated via [`PostStore::increment_view_count`]
    pub fn view_count(&self, post_id: Uuid) -> i64 {
        *self.view_counts.lock().unwrap().get(&post_id).unwrap_or(&0)
    }
}

#[async_trait]
impl PostStore for MemPostStore {
    async fn list_visible(
        &self,
        authors: Option<&[Uuid]>,
        excluded: &[Uuid],
        before: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let posts = self.posts.lock().unwrap();
        let mut rows: Vec<Post> = posts
            .values()
            .filter(|p| !p.is_hidden)
            .filter(|p| authors.map_or(true, |a| a.contains(&p.author_id)))
            .filter(|p| !excluded.contains(&p.author_id))
            .filter(|p| {
                before.map_or(true, |c| {
                    p.created_at < c.created_at
                        || (p.created_at == c.created_at && p.id > c.post_id)
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn get(&self, post_id: Uuid) -> Result<Option<Post>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        Ok(self.posts.lock().unwrap().get(&post_id).cloned())
    }

    async fn insert(&self, post: &Post) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        self.posts.lock().unwrap().insert(post.id, post.clone());
        Ok(())
    }

    async fn increment_view_count(&self, post_id: Uuid) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        *self.view_counts.lock().unwrap().entry(post_id).or_insert(0) += 1;
        Ok(())
    }
}

/// In-memory reaction store
#[derive(Default)]
pub struct MemReactionStore {
    reactions: Mutex<HashSet<(Uuid, Uuid, String)>>,
    counts: Mutex<HashMap<Uuid, i64>>,
    failing: AtomicBool,
}

impl MemReactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn count(&self, post_id: Uuid) -> i64 {
        *self.counts.lock().unwrap().get(&post_id).unwrap_or(&0)
    }
}

#[async_trait]
impl ReactionStore for MemReactionStore {
    async fn toggle(&self, post_id: Uuid, user_id: Uuid, emoji: &str) -> Result<ReactionToggle> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        // Single lock covers the flip and the count, mirroring the
        // single-statement Postgres toggle.
        let mut reactions = self.reactions.lock().unwrap();
        let mut counts = self.counts.lock().unwrap();
        let key = (post_id, user_id, emoji.to_string());
        let count = counts.entry(post_id).or_insert(0);
        let added = if reactions.contains(&key) {
            reactions.remove(&key);
            *count = (*count - 1).max(0);
            false
        } else {
            reactions.insert(key);
            *count += 1;
            true
        };
        Ok(ReactionToggle {
            added,
            reaction_count: *count,
        })
    }

    async fn exists(&self, post_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let key = (post_id, user_id, emoji.to_string());
        Ok(self.reactions.lock().unwrap().contains(&key))
    }
}

/// In-memory comment store
#[derive(Default)]
pub struct MemCommentStore {
    comments: Mutex<HashMap<Uuid, Comment>>,
    failing: AtomicBool,
}

impl MemCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.comments.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CommentStore for MemCommentStore {
    async fn insert(&self, comment: &Comment) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        self.comments
            .lock()
            .unwrap()
            .insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        Ok(self.comments.lock().unwrap().get(&comment_id).cloned())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let comments = self.comments.lock().unwrap();
        let mut rows: Vec<Comment> = comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn delete_subtree(&self, comment_id: Uuid, author_id: Uuid) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let mut comments = self.comments.lock().unwrap();
        match comments.get(&comment_id) {
            Some(root) if root.author_id == author_id => {}
            _ => return Ok(0),
        }

        // Collect the full subtree before removing anything so a partial
        // removal is never observable.
        let mut doomed = vec![comment_id];
        let mut frontier = vec![comment_id];
        while let Some(parent) = frontier.pop() {
            for child in comments
                .values()
                .filter(|c| c.parent_id == Some(parent))
                .map(|c| c.id)
                .collect::<Vec<_>>()
            {
                doomed.push(child);
                frontier.push(child);
            }
        }
        for id in &doomed {
            comments.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

/// In-memory view-record store
#[derive(Default)]
pub struct MemViewStore {
    records: Mutex<Vec<ViewRecord>>,
    failing: AtomicBool,
}

impl MemViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ViewStore for MemViewStore {
    async fn insert_view(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.viewer_id == viewer_id && r.post_id == post_id)
        {
            return Ok(false);
        }
        records.push(ViewRecord {
            viewer_id,
            post_id,
            first_seen_at: Utc::now(),
        });
        Ok(true)
    }

    async fn is_seen(&self, viewer_id: Uuid, post_id: Uuid) -> Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.viewer_id == viewer_id && r.post_id == post_id))
    }

    async fn load_seen(&self, viewer_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.viewer_id == viewer_id)
            .take(limit)
            .map(|r| r.post_id)
            .collect())
    }
}
