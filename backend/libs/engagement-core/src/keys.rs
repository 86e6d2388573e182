//! Cache key schema
//!
//! Counter keys: {entity}:{metric}:{id}
//! Membership keys: {edge}:user:{actor_id}

use std::fmt;

use crate::model::{EdgeKind, EntityId, Metric};

/// Sorted set holding every ranked video.
pub const RANKED_INDEX_KEY: &str = "video:score";

/// A single cached counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub metric: Metric,
    pub id: EntityId,
}

impl CounterKey {
    pub fn new(metric: Metric, id: EntityId) -> Self {
        Self { metric, id }
    }

    /// Format: video:favorite:{id}
    pub fn video_favorites(id: EntityId) -> Self {
        Self::new(Metric::VideoFavorites, id)
    }

    /// Format: video:comment:{id}
    pub fn video_comments(id: EntityId) -> Self {
        Self::new(Metric::VideoComments, id)
    }

    /// Format: user:follower:{id}
    pub fn user_followers(id: EntityId) -> Self {
        Self::new(Metric::UserFollowers, id)
    }

    /// Format: user:following:{id}
    pub fn user_following(id: EntityId) -> Self {
        Self::new(Metric::UserFollowing, id)
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.metric, self.id)
    }
}

/// Set of targets an actor has an active edge to.
/// Format: favorite:user:{actor_id}
pub fn membership(kind: EdgeKind, actor_id: EntityId) -> String {
    format!("{}:user:{}", kind, actor_id)
}
