//! Cache-aside mirror of the authoritative counters
//!
//! Entries are advisory: a miss or a backend failure always falls back to the
//! store, and every written value is clamped to be non-negative.

mod backend;
mod membership;
mod memory;

pub use backend::{CacheBackend, RedisCacheBackend};
pub use membership::EdgeMembership;
pub use memory::MemoryCacheBackend;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Result;
use crate::keys::CounterKey;
use crate::metrics::EngineMetrics;
use crate::model::{EntityId, Metric};
use crate::store::CounterStore;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid cache data: {0}")]
    InvalidData(String),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

pub struct CounterCache {
    backend: Arc<dyn CacheBackend>,
    store: Arc<dyn CounterStore>,
    ttl: Duration,
    metrics: EngineMetrics,
}

impl CounterCache {
    pub fn new(backend: Arc<dyn CacheBackend>, store: Arc<dyn CounterStore>, ttl: Duration) -> Self {
        Self {
            backend,
            store,
            ttl,
            metrics: EngineMetrics::new(),
        }
    }

    // ========== Reads ==========

    /// Cached value, or the authoritative value seeded into the cache.
    ///
    /// Concurrent misses on the same key each load from the store.
    pub async fn get_or_load(&self, key: CounterKey) -> Result<i64> {
        let cache_key = key.to_string();

        match self.backend.get_counter(&cache_key).await {
            Ok(Some(value)) => {
                self.metrics.record_hit(key.metric);
                return Ok(value.max(0));
            }
            Ok(None) => self.metrics.record_miss(key.metric),
            Err(err) => {
                self.metrics.record_cache_error("get");
                warn!(error = ?err, key = %cache_key, "Counter cache read failed, using store");
            }
        }

        let count = self.store.load_count(key.metric, key.id).await?.max(0);

        if let Err(err) = self.backend.set_counter(&cache_key, count, self.ttl).await {
            self.metrics.record_cache_error("seed");
            warn!(error = ?err, key = %cache_key, "Failed to seed counter cache");
        }

        Ok(count)
    }

    /// Cached values only, in key order. `None` is a miss. Values are clamped.
    pub async fn batch_get(&self, keys: &[CounterKey]) -> Result<Vec<Option<i64>>> {
        let cache_keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let values = self.backend.get_counters(&cache_keys).await?;

        for (key, value) in keys.iter().zip(values.iter()) {
            match value {
                Some(_) => self.metrics.record_hit(key.metric),
                None => self.metrics.record_miss(key.metric),
            }
        }

        Ok(values.into_iter().map(|v| v.map(|n| n.max(0))).collect())
    }

    // ========== Writes ==========

    /// Apply a delta that the store has already committed.
    ///
    /// An absent entry is seeded first. The authority already includes this
    /// delta, so the seed is `authority - delta` and the increment lands the
    /// entry on the authoritative value.
    pub async fn apply_delta(&self, key: CounterKey, delta: i64) -> Result<i64> {
        let cache_key = key.to_string();

        if self.backend.get_counter(&cache_key).await?.is_none() {
            self.metrics.record_miss(key.metric);
            let authoritative = self.store.load_count(key.metric, key.id).await?;
            let seed = (authoritative - delta).max(0);
            self.backend.set_counter(&cache_key, seed, self.ttl).await?;
        }

        let value = self.backend.incr_counter(&cache_key, delta).await?;
        if value < 0 {
            debug!(key = %cache_key, value, "Clamping negative counter to zero");
            self.backend.set_counter(&cache_key, 0, self.ttl).await?;
            return Ok(0);
        }

        Ok(value)
    }

    /// Overwrite an entry with a value read from the authority.
    pub async fn set_absolute_from_authority(&self, key: CounterKey, count: i64) -> Result<()> {
        self.backend
            .set_counter(&key.to_string(), count.max(0), self.ttl)
            .await?;
        Ok(())
    }

    /// Seed many entries in one round trip.
    pub async fn backfill(&self, entries: &[(CounterKey, i64)]) -> Result<()> {
        let entries: Vec<(String, i64)> = entries
            .iter()
            .map(|(key, count)| (key.to_string(), (*count).max(0)))
            .collect();
        self.backend.set_counters(&entries, self.ttl).await?;
        Ok(())
    }

    /// Re-seed entries for `ids` from the authority. Returns how many were written.
    pub async fn reconcile(&self, metric: Metric, ids: &[EntityId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let counts: HashMap<EntityId, i64> = self.store.batch_load_counts(metric, ids).await?;
        let entries: Vec<(CounterKey, i64)> = ids
            .iter()
            .map(|id| (CounterKey::new(metric, *id), counts.get(id).copied().unwrap_or(0)))
            .collect();

        self.backfill(&entries).await?;
        debug!(metric = %metric, reconciled = entries.len(), "Reconciled counter cache");
        Ok(entries.len())
    }
}
