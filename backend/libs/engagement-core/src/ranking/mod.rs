//! Popularity scoring and the global ranked index.

mod index;
pub mod score;

pub use index::{RankedIndex, RankedSlice};

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::error::{EngagementError, Result};
use crate::model::{EntityId, Video};
use crate::store::CounterStore;

/// Recomputes a video's score from authoritative counts and writes it to the index.
pub struct Rescorer {
    store: Arc<dyn CounterStore>,
    index: Arc<RankedIndex>,
}

impl Rescorer {
    pub fn new(store: Arc<dyn CounterStore>, index: Arc<RankedIndex>) -> Self {
        Self { store, index }
    }

    pub async fn rescore(&self, video_id: EntityId) -> Result<f64> {
        let stats = self.store.video_stats(video_id).await?;
        let score = score::score_at(&stats, Utc::now());

        self.index
            .upsert(video_id, score)
            .await
            .map_err(|e| EngagementError::Index(e.to_string()))?;

        debug!(video_id, score, "Rescored video");
        Ok(score)
    }

    /// Seed a freshly published video, which has no engagement yet.
    pub async fn seed(&self, video: &Video) -> Result<f64> {
        let age = score::age_hours(video.created_at, Utc::now());
        let score = score::score(0, 0, age);

        self.index
            .upsert(video.id, score)
            .await
            .map_err(|e| EngagementError::Index(e.to_string()))?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheBackend;
    use crate::store::MemoryCounterStore;
    use chrono::Duration;

    #[tokio::test]
    async fn test_rescore_reflects_authoritative_counts() {
        let store = Arc::new(MemoryCounterStore::new());
        let index = Arc::new(RankedIndex::new(Arc::new(MemoryCacheBackend::new())));
        let rescorer = Rescorer::new(store.clone(), index.clone());

        let old_popular = store
            .seed_video_at(1, 500, 100, Utc::now() - Duration::days(30))
            .await;
        let fresh = store.seed_video(1, 0, 0).await;

        rescorer.rescore(old_popular.id).await.unwrap();
        rescorer.rescore(fresh.id).await.unwrap();

        assert_eq!(
            index.range_descending(0, 2).await.unwrap().ids,
            vec![old_popular.id, fresh.id]
        );
        let score = index.score_of(old_popular.id).await.unwrap().unwrap();
        assert!(score > 700.0 && score < 701.0);
    }

    #[tokio::test]
    async fn test_rescore_unknown_video_is_not_found() {
        let store = Arc::new(MemoryCounterStore::new());
        let index = Arc::new(RankedIndex::new(Arc::new(MemoryCacheBackend::new())));
        let rescorer = Rescorer::new(store, index);

        assert!(matches!(
            rescorer.rescore(42).await,
            Err(EngagementError::NotFound(_))
        ));
    }
}
