//! Ranked feed pages hydrated with rows, fresh counters and authors.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::CounterCache;
use crate::collaborators::AuthorDirectory;
use crate::error::{EngagementError, Result};
use crate::keys::CounterKey;
use crate::model::{Author, EntityId, FeedPage, HydratedVideo, LatestPage, Metric, Video};
use crate::ranking::RankedIndex;
use crate::store::CounterStore;

pub struct FeedAssembler {
    index: Arc<RankedIndex>,
    store: Arc<dyn CounterStore>,
    cache: Arc<CounterCache>,
    authors: Arc<dyn AuthorDirectory>,
    max_page: usize,
}

impl FeedAssembler {
    pub fn new(
        index: Arc<RankedIndex>,
        store: Arc<dyn CounterStore>,
        cache: Arc<CounterCache>,
        authors: Arc<dyn AuthorDirectory>,
        max_page: usize,
    ) -> Self {
        Self {
            index,
            store,
            cache,
            authors,
            max_page: max_page.max(1),
        }
    }

    /// One page in rank order. Index and row lookups must succeed; counter
    /// and author lookups degrade.
    ///
    /// `next_offset` advances past every ranked member read, including ids
    /// with no row, so consecutive pages never overlap. A zero `limit` reads
    /// nothing.
    #[instrument(skip(self))]
    pub async fn page(&self, offset: usize, limit: usize) -> Result<FeedPage> {
        let limit = limit.min(self.max_page);
        if limit == 0 {
            return Ok(FeedPage {
                videos: Vec::new(),
                next_offset: offset,
            });
        }

        let slice = self
            .index
            .range_descending(offset, limit)
            .await
            .map_err(|e| EngagementError::Index(e.to_string()))?;
        let next_offset = offset.saturating_add(slice.scanned);
        if slice.ids.is_empty() {
            return Ok(FeedPage {
                videos: Vec::new(),
                next_offset,
            });
        }

        let ids = slice.ids;
        let rows = self.store.load_videos(&ids).await?;
        let mut by_id: HashMap<EntityId, Video> = rows.into_iter().map(|v| (v.id, v)).collect();
        let videos: Vec<Video> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        if videos.len() < ids.len() {
            debug!(
                ranked = ids.len(),
                found = videos.len(),
                "Skipping ranked ids with no video row"
            );
        }

        let videos = self.hydrate(videos).await;
        Ok(FeedPage { videos, next_offset })
    }

    /// Videos created strictly before `before`, newest first.
    #[instrument(skip(self))]
    pub async fn latest(&self, before: DateTime<Utc>, limit: usize) -> Result<LatestPage> {
        let limit = limit.min(self.max_page);
        if limit == 0 {
            return Ok(LatestPage {
                videos: Vec::new(),
                next_before: Some(before),
            });
        }

        let videos = self.store.list_videos_before(before, limit as i64).await?;
        let next_before = videos.last().map(|v| v.created_at);
        let videos = self.hydrate(videos).await;
        Ok(LatestPage { videos, next_before })
    }

    async fn hydrate(&self, mut videos: Vec<Video>) -> Vec<HydratedVideo> {
        self.fill_counters(&mut videos).await;
        let authors = self.resolve_authors(&videos).await;

        videos
            .into_iter()
            .map(|video| {
                let author = authors.get(&video.author_id).cloned();
                HydratedVideo { video, author }
            })
            .collect()
    }

    /// Overwrite row counts with cached ones; load misses from the store and
    /// back-fill them.
    async fn fill_counters(&self, videos: &mut [Video]) {
        if videos.is_empty() {
            return;
        }
        let keys: Vec<CounterKey> = videos
            .iter()
            .flat_map(|v| [CounterKey::video_favorites(v.id), CounterKey::video_comments(v.id)])
            .collect();

        let cached = match self.cache.batch_get(&keys).await {
            Ok(values) => values,
            Err(err) => {
                warn!(error = ?err, "Counter multi-get failed, using row counts");
                return;
            }
        };

        let mut favorite_misses = Vec::new();
        let mut comment_misses = Vec::new();
        for (video, pair) in videos.iter_mut().zip(cached.chunks(2)) {
            match pair.first().copied().flatten() {
                Some(count) => video.favorite_count = count,
                None => favorite_misses.push(video.id),
            }
            match pair.get(1).copied().flatten() {
                Some(count) => video.comment_count = count,
                None => comment_misses.push(video.id),
            }
        }
        if favorite_misses.is_empty() && comment_misses.is_empty() {
            return;
        }

        let loaded = tokio::try_join!(
            self.store
                .batch_load_counts(Metric::VideoFavorites, &favorite_misses),
            self.store
                .batch_load_counts(Metric::VideoComments, &comment_misses),
        );
        let (favorites, comments) = match loaded {
            Ok(counts) => counts,
            Err(err) => {
                warn!(error = ?err, "Counter fallback load failed, using row counts");
                return;
            }
        };

        let mut backfill = Vec::with_capacity(favorites.len() + comments.len());
        for video in videos.iter_mut() {
            if let Some(&count) = favorites.get(&video.id) {
                video.favorite_count = count.max(0);
                backfill.push((CounterKey::video_favorites(video.id), count));
            }
            if let Some(&count) = comments.get(&video.id) {
                video.comment_count = count.max(0);
                backfill.push((CounterKey::video_comments(video.id), count));
            }
        }

        if let Err(err) = self.cache.backfill(&backfill).await {
            warn!(error = ?err, entries = backfill.len(), "Counter back-fill failed");
        }
    }

    async fn resolve_authors(&self, videos: &[Video]) -> HashMap<EntityId, Author> {
        let ids: Vec<EntityId> = videos
            .iter()
            .map(|v| v.author_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        match self.authors.batch_get(&ids).await {
            Ok(authors) => authors,
            Err(err) => {
                warn!(error = ?err, "Author lookup failed, returning feed without authors");
                HashMap::new()
            }
        }
    }
}
