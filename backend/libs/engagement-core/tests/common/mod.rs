#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engagement_core::cache::CacheResult;
use engagement_core::model::{NewComment, VideoStats};
use engagement_core::{
    Author, AuthorDirectory, CacheBackend, CacheError, Comment, CounterStore, Direction, EdgeKind,
    EdgeState, EngagementEngine, EngagementError, EngineConfig, EngineParts, EntityDirectory,
    EntityId, EntityKind, MemoryCacheBackend, MemoryCounterStore, Metric, NewVideo, RefreshWorker,
    Result, Video,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub store: Arc<MemoryCounterStore>,
    pub backend: Arc<MemoryCacheBackend>,
    pub engine: Arc<EngagementEngine>,
    pub worker: RefreshWorker,
}

pub fn config() -> EngineConfig {
    EngineConfig {
        feed_max_page: 3,
        ..EngineConfig::default()
    }
}

/// Engine over in-process backends, with the store doubling as directory.
pub fn harness() -> Harness {
    let store = Arc::new(MemoryCounterStore::new());
    let backend = Arc::new(MemoryCacheBackend::new());
    let (engine, worker) = EngagementEngine::start(
        &config(),
        EngineParts {
            store: store.clone(),
            cache_backend: backend.clone(),
            directory: store.clone(),
            authors: store.clone(),
        },
    );

    Harness {
        store,
        backend,
        engine: Arc::new(engine),
        worker,
    }
}

/// Delegates to the in-process store, counting authoritative counter reads.
pub struct CountingStore {
    pub inner: Arc<MemoryCounterStore>,
    pub count_loads: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryCounterStore>) -> Self {
        Self {
            inner,
            count_loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.count_loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for CountingStore {
    async fn edge_state(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId) -> Result<EdgeState> {
        self.inner.edge_state(kind, actor_id, target_id).await
    }

    async fn apply_edge_mutation(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    ) -> Result<()> {
        self.inner
            .apply_edge_mutation(kind, actor_id, target_id, direction)
            .await
    }

    async fn list_edge_targets(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EntityId>> {
        self.inner
            .list_edge_targets(kind, actor_id, limit, offset)
            .await
    }

    async fn load_count(&self, metric: Metric, id: EntityId) -> Result<i64> {
        self.count_loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_count(metric, id).await
    }

    async fn batch_load_counts(&self, metric: Metric, ids: &[EntityId]) -> Result<HashMap<EntityId, i64>> {
        if !ids.is_empty() {
            self.count_loads.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.batch_load_counts(metric, ids).await
    }

    async fn insert_video(&self, new: NewVideo) -> Result<Video> {
        self.inner.insert_video(new).await
    }

    async fn load_videos(&self, ids: &[EntityId]) -> Result<Vec<Video>> {
        self.inner.load_videos(ids).await
    }

    async fn video_stats(&self, id: EntityId) -> Result<VideoStats> {
        self.inner.video_stats(id).await
    }

    async fn list_author_videos(&self, author_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Video>> {
        self.inner.list_author_videos(author_id, limit, offset).await
    }

    async fn list_videos_before(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<Video>> {
        self.inner.list_videos_before(before, limit).await
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        self.inner.insert_comment(new).await
    }

    async fn soft_delete_comment(&self, comment_id: EntityId, video_id: EntityId, user_id: EntityId) -> Result<()> {
        self.inner.soft_delete_comment(comment_id, video_id, user_id).await
    }

    async fn list_comments(&self, video_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Comment>> {
        self.inner.list_comments(video_id, limit, offset).await
    }
}

/// Reports a fixed edge state, then loses every conditional write, as if a
/// concurrent request committed in between.
pub struct RacingStore {
    pub inner: Arc<MemoryCounterStore>,
    pub observed: EdgeState,
}

#[async_trait]
impl CounterStore for RacingStore {
    async fn edge_state(&self, _kind: EdgeKind, _actor_id: EntityId, _target_id: EntityId) -> Result<EdgeState> {
        Ok(self.observed)
    }

    async fn apply_edge_mutation(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    ) -> Result<()> {
        Err(EngagementError::EdgeState(format!(
            "{} {}->{} changed concurrently ({})",
            kind, actor_id, target_id, direction
        )))
    }

    async fn list_edge_targets(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EntityId>> {
        self.inner
            .list_edge_targets(kind, actor_id, limit, offset)
            .await
    }

    async fn load_count(&self, metric: Metric, id: EntityId) -> Result<i64> {
        self.inner.load_count(metric, id).await
    }

    async fn batch_load_counts(&self, metric: Metric, ids: &[EntityId]) -> Result<HashMap<EntityId, i64>> {
        self.inner.batch_load_counts(metric, ids).await
    }

    async fn insert_video(&self, new: NewVideo) -> Result<Video> {
        self.inner.insert_video(new).await
    }

    async fn load_videos(&self, ids: &[EntityId]) -> Result<Vec<Video>> {
        self.inner.load_videos(ids).await
    }

    async fn video_stats(&self, id: EntityId) -> Result<VideoStats> {
        self.inner.video_stats(id).await
    }

    async fn list_author_videos(&self, author_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Video>> {
        self.inner.list_author_videos(author_id, limit, offset).await
    }

    async fn list_videos_before(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<Video>> {
        self.inner.list_videos_before(before, limit).await
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        self.inner.insert_comment(new).await
    }

    async fn soft_delete_comment(&self, comment_id: EntityId, video_id: EntityId, user_id: EntityId) -> Result<()> {
        self.inner.soft_delete_comment(comment_id, video_id, user_id).await
    }

    async fn list_comments(&self, video_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Comment>> {
        self.inner.list_comments(video_id, limit, offset).await
    }
}

/// Memory backend whose counter reads can be switched off independently of
/// the ranked index, and whose membership adds can be slowed down.
pub struct FlakyCounterBackend {
    pub inner: Arc<MemoryCacheBackend>,
    pub fail_counters: AtomicBool,
    pub add_member_delay_ms: AtomicU64,
}

impl FlakyCounterBackend {
    pub fn new(inner: Arc<MemoryCacheBackend>) -> Self {
        Self {
            inner,
            fail_counters: AtomicBool::new(false),
            add_member_delay_ms: AtomicU64::new(0),
        }
    }

    fn check(&self) -> CacheResult<()> {
        if self.fail_counters.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("counter reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FlakyCounterBackend {
    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>> {
        self.check()?;
        self.inner.get_counter(key).await
    }

    async fn get_counters(&self, keys: &[String]) -> CacheResult<Vec<Option<i64>>> {
        self.check()?;
        self.inner.get_counters(keys).await
    }

    async fn set_counter(&self, key: &str, value: i64, ttl: Duration) -> CacheResult<()> {
        self.inner.set_counter(key, value, ttl).await
    }

    async fn set_counters(&self, entries: &[(String, i64)], ttl: Duration) -> CacheResult<()> {
        self.inner.set_counters(entries, ttl).await
    }

    async fn incr_counter(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.inner.incr_counter(key, delta).await
    }

    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()> {
        let delay = self.add_member_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.add_member(key, member, ttl).await
    }

    async fn remove_member(&self, key: &str, member: &str) -> CacheResult<()> {
        self.inner.remove_member(key, member).await
    }

    async fn is_member(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.inner.is_member(key, member).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()> {
        self.inner.zadd(key, member, score).await
    }

    async fn zrevrange(&self, key: &str, offset: usize, limit: usize) -> CacheResult<Vec<String>> {
        self.inner.zrevrange(key, offset, limit).await
    }

    async fn zscore(&self, key: &str, member: &str) -> CacheResult<Option<f64>> {
        self.inner.zscore(key, member).await
    }
}

pub struct FailingAuthors;

#[async_trait]
impl AuthorDirectory for FailingAuthors {
    async fn batch_get(&self, _ids: &[EntityId]) -> Result<HashMap<EntityId, Author>> {
        Err(EngagementError::Upstream("user service unavailable".to_string()))
    }
}

pub struct AllExist;

#[async_trait]
impl EntityDirectory for AllExist {
    async fn exists(&self, _kind: EntityKind, _id: EntityId) -> Result<bool> {
        Ok(true)
    }
}
