//! Domain types shared by the store, cache and ranking layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngagementError;

pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Video,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Video => "video",
            EntityKind::User => "user",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A denormalized count owned by a video or user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    VideoFavorites,
    VideoComments,
    UserFollowers,
    UserFollowing,
}

impl Metric {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Metric::VideoFavorites | Metric::VideoComments => EntityKind::Video,
            Metric::UserFollowers | Metric::UserFollowing => EntityKind::User,
        }
    }

    /// Middle segment of the cache key and metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::VideoFavorites => "favorite",
            Metric::VideoComments => "comment",
            Metric::UserFollowers => "follower",
            Metric::UserFollowing => "following",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_kind(), self.name())
    }
}

/// Which end of an edge a counter effect lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Actor,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEffect {
    pub side: Side,
    pub metric: Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// user → video
    Favorite,
    /// user → user
    Follow,
}

const FAVORITE_EFFECTS: [CounterEffect; 1] = [CounterEffect {
    side: Side::Target,
    metric: Metric::VideoFavorites,
}];

const FOLLOW_EFFECTS: [CounterEffect; 2] = [
    CounterEffect {
        side: Side::Target,
        metric: Metric::UserFollowers,
    },
    CounterEffect {
        side: Side::Actor,
        metric: Metric::UserFollowing,
    },
];

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Favorite => "favorite",
            EdgeKind::Follow => "follow",
        }
    }

    pub fn target_kind(&self) -> EntityKind {
        match self {
            EdgeKind::Favorite => EntityKind::Video,
            EdgeKind::Follow => EntityKind::User,
        }
    }

    /// Counters moved by one state transition of this edge kind.
    pub fn counter_effects(&self) -> &'static [CounterEffect] {
        match self {
            EdgeKind::Favorite => &FAVORITE_EFFECTS,
            EdgeKind::Follow => &FOLLOW_EFFECTS,
        }
    }

    /// `(metric, owner)` pairs moved by a transition of `actor_id → target_id`,
    /// ordered by owning row. Writers lock rows in this order, so opposing
    /// follows between two users cannot deadlock.
    pub fn owned_counters(&self, actor_id: EntityId, target_id: EntityId) -> Vec<(Metric, EntityId)> {
        let mut owned: Vec<(Metric, EntityId)> = self
            .counter_effects()
            .iter()
            .map(|effect| match effect.side {
                Side::Actor => (effect.metric, actor_id),
                Side::Target => (effect.metric, target_id),
            })
            .collect();
        owned.sort_by_key(|(metric, owner)| (metric.entity_kind(), *owner));
        owned
    }

    /// Whether a transition changes a video's ranking inputs.
    pub fn affects_ranking(&self) -> bool {
        matches!(self, EdgeKind::Favorite)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeKind {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "favorite" => Ok(EdgeKind::Favorite),
            "follow" => Ok(EdgeKind::Follow),
            other => Err(EngagementError::Store(format!("unknown edge kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    Active,
    Deleted,
    Absent,
}

impl fmt::Display for EdgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeState::Active => "active",
            EdgeState::Deleted => "deleted",
            EdgeState::Absent => "absent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Absent → Active
    Create,
    /// Deleted → Active
    Restore,
    /// Active → Deleted
    Delete,
}

impl Direction {
    pub fn delta(&self) -> i64 {
        match self {
            Direction::Create | Direction::Restore => 1,
            Direction::Delete => -1,
        }
    }

    /// State the edge must be in for this transition to apply.
    pub fn required_state(&self) -> EdgeState {
        match self {
            Direction::Create => EdgeState::Absent,
            Direction::Restore => EdgeState::Deleted,
            Direction::Delete => EdgeState::Active,
        }
    }

    /// Pick the transition for a user action given the current edge state.
    pub fn plan(action: ToggleAction, state: EdgeState) -> Option<Direction> {
        match (action, state) {
            (ToggleAction::Add, EdgeState::Absent) => Some(Direction::Create),
            (ToggleAction::Add, EdgeState::Deleted) => Some(Direction::Restore),
            (ToggleAction::Remove, EdgeState::Active) => Some(Direction::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Create => "create",
            Direction::Restore => "restore",
            Direction::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Add,
    Remove,
}

/// Wire action codes: 1 = add, 2 = remove.
impl TryFrom<i32> for ToggleAction {
    type Error = EngagementError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ToggleAction::Add),
            2 => Ok(ToggleAction::Remove),
            other => Err(EngagementError::Validation(format!(
                "invalid action type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: EntityId,
    pub author_id: EntityId,
    pub title: String,
    pub play_url: String,
    pub cover_url: String,
    pub favorite_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVideo {
    pub author_id: EntityId,
    pub title: String,
    pub play_url: String,
    pub cover_url: String,
}

/// Ranking inputs for one video, read from the authority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoStats {
    pub favorite_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: EntityId,
    pub video_id: EntityId,
    pub user_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub video_id: EntityId,
    pub user_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: EntityId,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A feed entry: the video row with fresh counters and its author, if resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydratedVideo {
    #[serde(flatten)]
    pub video: Video,
    pub author: Option<Author>,
}

/// One feed page and where the next one starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub videos: Vec<HydratedVideo>,
    pub next_offset: usize,
}

/// Newest-first page. `next_before` is the creation time to pass for the
/// next page, absent once the feed is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPage {
    pub videos: Vec<HydratedVideo>,
    pub next_before: Option<DateTime<Utc>>,
}
