//! Wiring of the store, derived layers and workflows behind one handle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheBackend, CounterCache, EdgeMembership};
use crate::collaborators::{AuthorDirectory, EntityDirectory};
use crate::comments::CommentLedger;
use crate::config::EngineConfig;
use crate::error::{EngagementError, Result};
use crate::feed::FeedAssembler;
use crate::keys::CounterKey;
use crate::model::{
    Author, Comment, EdgeKind, EntityId, EntityKind, FeedPage, LatestPage, Metric, NewVideo,
    ToggleAction, Video,
};
use crate::ranking::{RankedIndex, Rescorer};
use crate::refresh::{RefreshContext, RefreshHandle, RefreshJob, RefreshWorker};
use crate::store::CounterStore;
use crate::toggle::{RelationToggle, ToggleOutcome};

/// Backends the engine is assembled from.
pub struct EngineParts {
    pub store: Arc<dyn CounterStore>,
    pub cache_backend: Arc<dyn CacheBackend>,
    pub directory: Arc<dyn EntityDirectory>,
    pub authors: Arc<dyn AuthorDirectory>,
}

/// Most counters one reconcile call may re-seed.
pub const MAX_RECONCILE_BATCH: usize = 1000;

pub struct EngagementEngine {
    store: Arc<dyn CounterStore>,
    directory: Arc<dyn EntityDirectory>,
    authors: Arc<dyn AuthorDirectory>,
    cache: Arc<CounterCache>,
    index: Arc<RankedIndex>,
    rescorer: Arc<Rescorer>,
    refresh: RefreshHandle,
    toggle: RelationToggle,
    comments: CommentLedger,
    feed: FeedAssembler,
}

impl EngagementEngine {
    /// Build the engine and spawn its refresh worker on the current runtime.
    pub fn start(config: &EngineConfig, parts: EngineParts) -> (Self, RefreshWorker) {
        let EngineParts {
            store,
            cache_backend,
            directory,
            authors,
        } = parts;

        let cache = Arc::new(CounterCache::new(
            cache_backend.clone(),
            store.clone(),
            config.counter_ttl(),
        ));
        let membership = Arc::new(EdgeMembership::new(
            cache_backend.clone(),
            config.membership_ttl(),
        ));
        let index = Arc::new(RankedIndex::new(cache_backend));
        let rescorer = Arc::new(Rescorer::new(store.clone(), index.clone()));

        let (refresh, worker) = RefreshWorker::spawn(
            RefreshContext {
                cache: cache.clone(),
                rescorer: rescorer.clone(),
            },
            config.refresh_queue_capacity,
            config.refresh_concurrency,
        );

        let toggle = RelationToggle::new(
            store.clone(),
            membership,
            directory.clone(),
            refresh.clone(),
        );
        let comments = CommentLedger::new(store.clone(), directory.clone(), refresh.clone());
        let feed = FeedAssembler::new(
            index.clone(),
            store.clone(),
            cache.clone(),
            authors.clone(),
            config.feed_max_page,
        );

        info!(
            queue_capacity = config.refresh_queue_capacity,
            concurrency = config.refresh_concurrency,
            "Engagement engine started"
        );

        let engine = Self {
            store,
            directory,
            authors,
            cache,
            index,
            rescorer,
            refresh,
            toggle,
            comments,
            feed,
        };
        (engine, worker)
    }

    // ========== Edges ==========

    pub async fn favorite(&self, user_id: EntityId, video_id: EntityId, action: ToggleAction) -> Result<ToggleOutcome> {
        self.toggle
            .toggle(EdgeKind::Favorite, user_id, video_id, action)
            .await
    }

    pub async fn follow(&self, user_id: EntityId, target_user_id: EntityId, action: ToggleAction) -> Result<ToggleOutcome> {
        self.toggle
            .toggle(EdgeKind::Follow, user_id, target_user_id, action)
            .await
    }

    /// Videos a user has favorited, most recent first.
    pub async fn favorite_videos(&self, user_id: EntityId, page: u32, page_size: u32) -> Result<Vec<Video>> {
        let ids = self
            .edge_targets(EdgeKind::Favorite, user_id, page, page_size)
            .await?;
        let mut by_id: HashMap<EntityId, Video> = self
            .store
            .load_videos(&ids)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Users a user follows, most recent first. Followed users with no
    /// directory entry are skipped.
    pub async fn following(&self, user_id: EntityId, page: u32, page_size: u32) -> Result<Vec<Author>> {
        let ids = self
            .edge_targets(EdgeKind::Follow, user_id, page, page_size)
            .await?;
        let mut by_id = self.authors.batch_get(&ids).await?;

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn edge_targets(&self, kind: EdgeKind, actor_id: EntityId, page: u32, page_size: u32) -> Result<Vec<EntityId>> {
        let (limit, offset) = page_window(page, page_size);
        self.store
            .list_edge_targets(kind, actor_id, limit, offset)
            .await
    }

    // ========== Comments ==========

    pub async fn post_comment(
        &self,
        user_id: EntityId,
        video_id: EntityId,
        content: &str,
        parent_id: Option<EntityId>,
    ) -> Result<Comment> {
        self.comments.post(user_id, video_id, content, parent_id).await
    }

    pub async fn delete_comment(&self, user_id: EntityId, comment_id: EntityId, video_id: EntityId) -> Result<()> {
        self.comments.retract(user_id, comment_id, video_id).await
    }

    pub async fn list_comments(&self, video_id: EntityId, page: u32, page_size: u32) -> Result<Vec<Comment>> {
        self.comments.list(video_id, page, page_size).await
    }

    // ========== Videos & feed ==========

    /// Persist a video and enter it into the ranked index.
    ///
    /// The row is the source of truth; a failed index seed is retried once in
    /// the background, after which the video enters the index on its first
    /// engagement.
    pub async fn publish_video(&self, new: NewVideo) -> Result<Video> {
        if new.title.trim().is_empty() || new.play_url.trim().is_empty() {
            return Err(EngagementError::Validation(
                "title and play_url are required".to_string(),
            ));
        }

        let video = self.store.insert_video(new).await?;
        if let Err(err) = self.rescorer.seed(&video).await {
            warn!(error = ?err, video_id = video.id, "Failed to seed ranked index");
            self.refresh.schedule(RefreshJob::Rescore { video_id: video.id });
        }

        info!(video_id = video.id, author_id = video.author_id, "Video published");
        Ok(video)
    }

    pub async fn feed_page(&self, offset: usize, limit: usize) -> Result<FeedPage> {
        self.feed.page(offset, limit).await
    }

    /// Newest videos created before `before`, or before now when absent.
    pub async fn latest_feed(&self, before: Option<DateTime<Utc>>, limit: usize) -> Result<LatestPage> {
        self.feed
            .latest(before.unwrap_or_else(Utc::now), limit)
            .await
    }

    /// An author's published videos, newest first.
    pub async fn author_videos(&self, author_id: EntityId, page: u32, page_size: u32) -> Result<Vec<Video>> {
        if !self.directory.exists(EntityKind::User, author_id).await? {
            return Err(EngagementError::NotFound(format!(
                "user {} does not exist",
                author_id
            )));
        }

        let (limit, offset) = page_window(page, page_size);
        self.store
            .list_author_videos(author_id, limit, offset)
            .await
    }

    /// Current count, served from the cache when possible.
    pub async fn counter(&self, key: CounterKey) -> Result<i64> {
        self.cache.get_or_load(key).await
    }

    /// Overwrite cached counters for `ids` with the authority's values.
    pub async fn reconcile_counters(&self, metric: Metric, ids: &[EntityId]) -> Result<usize> {
        if ids.is_empty() || ids.len() > MAX_RECONCILE_BATCH {
            return Err(EngagementError::Validation(format!(
                "reconcile takes 1 to {} ids",
                MAX_RECONCILE_BATCH
            )));
        }

        let written = self.cache.reconcile(metric, ids).await?;
        info!(metric = %metric, written, "Counter cache reconciled");
        Ok(written)
    }

    pub fn cache(&self) -> &CounterCache {
        &self.cache
    }

    pub fn index(&self) -> &RankedIndex {
        &self.index
    }

    /// Wait for every refresh scheduled so far.
    pub async fn flush(&self) {
        self.refresh.flush().await
    }
}

/// `(limit, offset)` for a 1-based page; page sizes are clamped to 1..=100.
fn page_window(page: u32, page_size: u32) -> (i64, i64) {
    let page_size = i64::from(page_size.clamp(1, 100));
    (page_size, i64::from(page.max(1) - 1) * page_size)
}
