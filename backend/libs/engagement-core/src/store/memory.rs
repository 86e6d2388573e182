use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::CounterStore;
use crate::collaborators::{AuthorDirectory, EntityDirectory};
use crate::error::{EngagementError, Result};
use crate::model::{
    Author, Comment, Direction, EdgeKind, EdgeState, EntityId, EntityKind, Metric, NewComment,
    NewVideo, Video, VideoStats,
};

struct UserRow {
    author: Author,
    follower_count: i64,
    following_count: i64,
}

struct EdgeRow {
    /// Bumped on every write so lists can order newest first.
    touched: u64,
    deleted: bool,
}

#[derive(Default)]
struct MemoryState {
    next_id: EntityId,
    clock: u64,
    users: HashMap<EntityId, UserRow>,
    videos: HashMap<EntityId, Video>,
    edges: HashMap<(EdgeKind, EntityId, EntityId), EdgeRow>,
    comments: BTreeMap<EntityId, Comment>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn edge_state(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId) -> EdgeState {
        match self.edges.get(&(kind, actor_id, target_id)) {
            None => EdgeState::Absent,
            Some(edge) if edge.deleted => EdgeState::Deleted,
            Some(_) => EdgeState::Active,
        }
    }

    fn counter(&self, metric: Metric, id: EntityId) -> Option<i64> {
        match metric {
            Metric::VideoFavorites => self.videos.get(&id).map(|v| v.favorite_count),
            Metric::VideoComments => self.videos.get(&id).map(|v| v.comment_count),
            Metric::UserFollowers => self.users.get(&id).map(|u| u.follower_count),
            Metric::UserFollowing => self.users.get(&id).map(|u| u.following_count),
        }
    }

    fn counter_mut(&mut self, metric: Metric, id: EntityId) -> Option<&mut i64> {
        match metric {
            Metric::VideoFavorites => self.videos.get_mut(&id).map(|v| &mut v.favorite_count),
            Metric::VideoComments => self.videos.get_mut(&id).map(|v| &mut v.comment_count),
            Metric::UserFollowers => self.users.get_mut(&id).map(|u| &mut u.follower_count),
            Metric::UserFollowing => self.users.get_mut(&id).map(|u| &mut u.following_count),
        }
    }

    fn missing_owner(metric: Metric, id: EntityId) -> EngagementError {
        EngagementError::NotFound(format!("{} {} does not exist", metric.entity_kind(), id))
    }
}

/// In-process store for tests and local development.
///
/// One mutex guards the whole state, so each operation behaves as a
/// serializable transaction. All checks run before any write.
#[derive(Default)]
pub struct MemoryCounterStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as if the database were down.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EngagementError::Store("injected write failure".to_string()));
        }
        Ok(())
    }

    pub async fn insert_user(&self, name: &str) -> Author {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let author = Author {
            id,
            name: name.to_string(),
            avatar_url: None,
        };
        state.users.insert(
            id,
            UserRow {
                author: author.clone(),
                follower_count: 0,
                following_count: 0,
            },
        );
        author
    }

    /// Insert a video row with preset counters, created now.
    pub async fn seed_video(&self, author_id: EntityId, favorite_count: i64, comment_count: i64) -> Video {
        self.seed_video_at(author_id, favorite_count, comment_count, Utc::now())
            .await
    }

    pub async fn seed_video_at(
        &self,
        author_id: EntityId,
        favorite_count: i64,
        comment_count: i64,
        created_at: DateTime<Utc>,
    ) -> Video {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let video = Video {
            id,
            author_id,
            title: format!("video {}", id),
            play_url: format!("https://cdn.example.com/{}.mp4", id),
            cover_url: format!("https://cdn.example.com/{}.jpg", id),
            favorite_count,
            comment_count,
            created_at,
        };
        state.videos.insert(id, video.clone());
        video
    }

    /// Number of edges of `kind` in each state, for assertions.
    pub async fn edge_rows(&self, kind: EdgeKind) -> (usize, usize) {
        let state = self.state.lock().await;
        state
            .edges
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .fold((0, 0), |(active, deleted), (_, edge)| {
                if edge.deleted {
                    (active, deleted + 1)
                } else {
                    (active + 1, deleted)
                }
            })
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn edge_state(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId) -> Result<EdgeState> {
        let state = self.state.lock().await;
        Ok(state.edge_state(kind, actor_id, target_id))
    }

    async fn apply_edge_mutation(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    ) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;

        let current = state.edge_state(kind, actor_id, target_id);
        if current != direction.required_state() {
            return Err(EngagementError::EdgeState(format!(
                "{} {}->{} is {}, not {}",
                kind,
                actor_id,
                target_id,
                current,
                direction.required_state()
            )));
        }

        let effects = kind.owned_counters(actor_id, target_id);
        for (metric, owner) in &effects {
            if state.counter(*metric, *owner).is_none() {
                return Err(MemoryState::missing_owner(*metric, *owner));
            }
        }

        let touched = state.tick();
        state.edges.insert(
            (kind, actor_id, target_id),
            EdgeRow {
                touched,
                deleted: direction == Direction::Delete,
            },
        );
        for (metric, owner) in effects {
            if let Some(count) = state.counter_mut(metric, owner) {
                *count = (*count + direction.delta()).max(0);
            }
        }

        Ok(())
    }

    async fn list_edge_targets(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EntityId>> {
        let state = self.state.lock().await;
        let mut active: Vec<(u64, EntityId)> = state
            .edges
            .iter()
            .filter(|((k, actor, _), edge)| *k == kind && *actor == actor_id && !edge.deleted)
            .map(|((_, _, target), edge)| (edge.touched, *target))
            .collect();
        active.sort_unstable_by(|a, b| b.cmp(a));

        Ok(active
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, target)| target)
            .collect())
    }

    async fn load_count(&self, metric: Metric, id: EntityId) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.counter(metric, id).unwrap_or(0))
    }

    async fn batch_load_counts(&self, metric: Metric, ids: &[EntityId]) -> Result<HashMap<EntityId, i64>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.counter(metric, *id).map(|count| (*id, count)))
            .collect())
    }

    async fn insert_video(&self, new: NewVideo) -> Result<Video> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let video = Video {
            id,
            author_id: new.author_id,
            title: new.title,
            play_url: new.play_url,
            cover_url: new.cover_url,
            favorite_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
        };
        state.videos.insert(id, video.clone());
        Ok(video)
    }

    async fn load_videos(&self, ids: &[EntityId]) -> Result<Vec<Video>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.videos.get(id).cloned())
            .collect())
    }

    async fn video_stats(&self, id: EntityId) -> Result<VideoStats> {
        let state = self.state.lock().await;
        let video = state
            .videos
            .get(&id)
            .ok_or_else(|| EngagementError::NotFound(format!("video {} does not exist", id)))?;

        Ok(VideoStats {
            favorite_count: video.favorite_count,
            comment_count: video.comment_count,
            created_at: video.created_at,
        })
    }

    async fn list_author_videos(&self, author_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Video>> {
        let state = self.state.lock().await;
        let mut videos: Vec<&Video> = state
            .videos
            .values()
            .filter(|v| v.author_id == author_id)
            .collect();
        videos.sort_unstable_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(videos
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_videos_before(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<Video>> {
        let state = self.state.lock().await;
        let mut videos: Vec<&Video> = state
            .videos
            .values()
            .filter(|v| v.created_at < before)
            .collect();
        videos.sort_unstable_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(videos
            .into_iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        self.check_writable()?;
        let mut state = self.state.lock().await;

        if !state.videos.contains_key(&new.video_id) {
            return Err(MemoryState::missing_owner(Metric::VideoComments, new.video_id));
        }

        let id = state.allocate_id();
        let comment = Comment {
            id,
            video_id: new.video_id,
            user_id: new.user_id,
            parent_id: new.parent_id,
            content: new.content,
            created_at: Utc::now(),
            deleted_at: None,
        };
        state.comments.insert(id, comment.clone());
        if let Some(count) = state.counter_mut(Metric::VideoComments, new.video_id) {
            *count += 1;
        }

        Ok(comment)
    }

    async fn soft_delete_comment(&self, comment_id: EntityId, video_id: EntityId, user_id: EntityId) -> Result<()> {
        self.check_writable()?;
        let mut state = self.state.lock().await;

        let live = state
            .comments
            .get(&comment_id)
            .map(|c| c.video_id == video_id && c.user_id == user_id && c.deleted_at.is_none())
            .unwrap_or(false);
        if !live {
            return Err(EngagementError::NotFound(format!(
                "comment {} on video {}",
                comment_id, video_id
            )));
        }
        if !state.videos.contains_key(&video_id) {
            return Err(MemoryState::missing_owner(Metric::VideoComments, video_id));
        }

        if let Some(comment) = state.comments.get_mut(&comment_id) {
            comment.deleted_at = Some(Utc::now());
        }
        if let Some(count) = state.counter_mut(Metric::VideoComments, video_id) {
            *count = (*count - 1).max(0);
        }

        Ok(())
    }

    async fn list_comments(&self, video_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        // Ids are allocated in insertion order, so reverse id order is newest first
        Ok(state
            .comments
            .values()
            .rev()
            .filter(|c| c.video_id == video_id && c.deleted_at.is_none())
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EntityDirectory for MemoryCounterStore {
    async fn exists(&self, kind: EntityKind, id: EntityId) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(match kind {
            EntityKind::Video => state.videos.contains_key(&id),
            EntityKind::User => state.users.contains_key(&id),
        })
    }
}

#[async_trait]
impl AuthorDirectory for MemoryCounterStore {
    async fn batch_get(&self, ids: &[EntityId]) -> Result<HashMap<EntityId, Author>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|u| (*id, u.author.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_edge_lifecycle_moves_counters() {
        let store = MemoryCounterStore::new();
        let user = store.insert_user("alice").await;
        let video = store.seed_video(user.id, 0, 0).await;

        store
            .apply_edge_mutation(EdgeKind::Favorite, user.id, video.id, Direction::Create)
            .await
            .unwrap();
        assert_eq!(store.load_count(Metric::VideoFavorites, video.id).await.unwrap(), 1);

        store
            .apply_edge_mutation(EdgeKind::Favorite, user.id, video.id, Direction::Delete)
            .await
            .unwrap();
        assert_eq!(
            store.edge_state(EdgeKind::Favorite, user.id, video.id).await.unwrap(),
            EdgeState::Deleted
        );
        assert_eq!(store.load_count(Metric::VideoFavorites, video.id).await.unwrap(), 0);

        store
            .apply_edge_mutation(EdgeKind::Favorite, user.id, video.id, Direction::Restore)
            .await
            .unwrap();
        assert_eq!(store.load_count(Metric::VideoFavorites, video.id).await.unwrap(), 1);
        assert_eq!(store.edge_rows(EdgeKind::Favorite).await, (1, 0));
    }

    #[tokio::test]
    async fn test_precondition_violation_changes_nothing() {
        let store = MemoryCounterStore::new();
        let user = store.insert_user("alice").await;
        let video = store.seed_video(user.id, 0, 0).await;

        let result = store
            .apply_edge_mutation(EdgeKind::Favorite, user.id, video.id, Direction::Delete)
            .await;
        assert!(matches!(result, Err(EngagementError::EdgeState(_))));
        assert_eq!(
            store.edge_state(EdgeKind::Favorite, user.id, video.id).await.unwrap(),
            EdgeState::Absent
        );
        assert_eq!(store.load_count(Metric::VideoFavorites, video.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_owner_rolls_back() {
        let store = MemoryCounterStore::new();
        let user = store.insert_user("alice").await;

        let result = store
            .apply_edge_mutation(EdgeKind::Follow, user.id, 404, Direction::Create)
            .await;
        assert!(matches!(result, Err(EngagementError::NotFound(_))));
        assert_eq!(
            store.edge_state(EdgeKind::Follow, user.id, 404).await.unwrap(),
            EdgeState::Absent
        );
        assert_eq!(store.load_count(Metric::UserFollowing, user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comment_soft_delete_requires_live_comment() {
        let store = MemoryCounterStore::new();
        let user = store.insert_user("alice").await;
        let video = store.seed_video(user.id, 0, 0).await;

        let comment = store
            .insert_comment(NewComment {
                video_id: video.id,
                user_id: user.id,
                parent_id: None,
                content: "first".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.load_count(Metric::VideoComments, video.id).await.unwrap(), 1);

        let stranger = store.soft_delete_comment(comment.id, video.id, user.id + 100).await;
        assert!(matches!(stranger, Err(EngagementError::NotFound(_))));
        assert_eq!(store.load_count(Metric::VideoComments, video.id).await.unwrap(), 1);

        store.soft_delete_comment(comment.id, video.id, user.id).await.unwrap();
        assert_eq!(store.load_count(Metric::VideoComments, video.id).await.unwrap(), 0);

        let again = store.soft_delete_comment(comment.id, video.id, user.id).await;
        assert!(matches!(again, Err(EngagementError::NotFound(_))));
        assert!(store.list_comments(video.id, 10, 0).await.unwrap().is_empty());
    }
}
