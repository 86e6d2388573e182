//! Authoritative persistence: edges, denormalized counters, comments, videos.
//!
//! Every edge transition and its counter deltas commit in one transaction.
//! Preconditions are enforced by conditional writes inside that transaction;
//! a violated precondition fails with `EdgeState` and changes nothing.

mod memory;
mod postgres;

pub use memory::MemoryCounterStore;
pub use postgres::{PgCounterStore, PgDirectory};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{
    Comment, Direction, EdgeKind, EdgeState, EntityId, Metric, NewComment, NewVideo, Video,
    VideoStats,
};

#[async_trait]
pub trait CounterStore: Send + Sync {
    // ========== Edges ==========

    async fn edge_state(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId) -> Result<EdgeState>;

    /// Move one edge through `direction` and apply its counter effects.
    ///
    /// Errors: `EdgeState` if the edge is not in `direction.required_state()`,
    /// `NotFound` if a counter-owning row is missing.
    async fn apply_edge_mutation(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    ) -> Result<()>;

    /// Active targets of an actor, newest first.
    async fn list_edge_targets(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EntityId>>;

    // ========== Counters ==========

    /// Missing owners count as 0.
    async fn load_count(&self, metric: Metric, id: EntityId) -> Result<i64>;

    /// Owners that do not exist are absent from the result.
    async fn batch_load_counts(&self, metric: Metric, ids: &[EntityId]) -> Result<HashMap<EntityId, i64>>;

    // ========== Videos ==========

    async fn insert_video(&self, new: NewVideo) -> Result<Video>;

    /// Rows for the ids that exist, in no particular order.
    async fn load_videos(&self, ids: &[EntityId]) -> Result<Vec<Video>>;

    async fn video_stats(&self, id: EntityId) -> Result<VideoStats>;

    /// An author's videos, newest first.
    async fn list_author_videos(&self, author_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Video>>;

    /// Videos created strictly before `before`, newest first.
    async fn list_videos_before(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<Video>>;

    // ========== Comments ==========

    /// Insert the comment and add 1 to the video's comment count.
    async fn insert_comment(&self, new: NewComment) -> Result<Comment>;

    /// Soft-delete a live comment written by `user_id` and subtract 1 from the
    /// video's comment count. Anyone else's comment is `NotFound`.
    async fn soft_delete_comment(&self, comment_id: EntityId, video_id: EntityId, user_id: EntityId) -> Result<()>;

    /// Live comments, newest first.
    async fn list_comments(&self, video_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Comment>>;
}
