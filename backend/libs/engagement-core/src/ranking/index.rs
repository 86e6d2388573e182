use std::sync::Arc;
use tracing::warn;

use crate::cache::{CacheBackend, CacheError, CacheResult};
use crate::keys::RANKED_INDEX_KEY;
use crate::model::EntityId;

/// A window of the index. `scanned` counts every member read, so the next
/// window starts at `offset + scanned`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSlice {
    pub ids: Vec<EntityId>,
    pub scanned: usize,
}

/// Global ordering of videos by score, one shared sorted set.
///
/// Members are never evicted.
pub struct RankedIndex {
    backend: Arc<dyn CacheBackend>,
    key: String,
}

impl RankedIndex {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            key: RANKED_INDEX_KEY.to_string(),
        }
    }

    /// Insert or rescore. Last write wins.
    pub async fn upsert(&self, video_id: EntityId, score: f64) -> CacheResult<()> {
        if !score.is_finite() {
            return Err(CacheError::InvalidData(format!(
                "non-finite score {} for video {}",
                score, video_id
            )));
        }

        self.backend
            .zadd(&self.key, &video_id.to_string(), score)
            .await
    }

    /// Ids ordered by descending score. Members that are not ids are skipped
    /// but still counted in `scanned`.
    pub async fn range_descending(&self, offset: usize, limit: usize) -> CacheResult<RankedSlice> {
        let members = self.backend.zrevrange(&self.key, offset, limit).await?;
        let scanned = members.len();

        let ids = members
            .into_iter()
            .filter_map(|member| match member.parse::<EntityId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(member = %member, "Skipping unparsable ranked index member");
                    None
                }
            })
            .collect();
        Ok(RankedSlice { ids, scanned })
    }

    pub async fn score_of(&self, video_id: EntityId) -> CacheResult<Option<f64>> {
        self.backend.zscore(&self.key, &video_id.to_string()).await
    }
}
