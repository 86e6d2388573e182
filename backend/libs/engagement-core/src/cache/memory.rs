//! In-process backend for tests and single-node development.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use super::backend::CacheBackend;
use super::{CacheError, CacheResult};

/// INCR on an absent key creates it without a TTL.
const NO_EXPIRY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Total order over scores so they can key a BTreeSet.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Highest score first; ties by member, descending, as ZREVRANGE does.
#[derive(Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<(Reverse<Score>, Reverse<String>)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) {
        if let Some(previous) = self.scores.insert(member.to_string(), score) {
            self.order
                .remove(&(Reverse(Score(previous)), Reverse(member.to_string())));
        }
        self.order
            .insert((Reverse(Score(score)), Reverse(member.to_string())));
    }

    fn range(&self, offset: usize, limit: usize) -> Vec<String> {
        self.order
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(_, Reverse(member))| member.clone())
            .collect()
    }
}

/// Counters and sets expire lazily on access. Sorted sets never expire.
#[derive(Default)]
pub struct MemoryCacheBackend {
    counters: DashMap<String, Expiring<i64>>,
    sets: DashMap<String, Expiring<HashSet<String>>>,
    sorted: RwLock<HashMap<String, SortedSet>>,
    unavailable: AtomicBool,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, as if the cache were down.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, AtomicOrdering::SeqCst);
    }

    /// Drop one key, as eviction would.
    pub fn evict(&self, key: &str) {
        self.counters.remove(key);
        self.sets.remove(key);
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(CacheError::Unavailable("memory backend disabled".to_string()));
        }
        Ok(())
    }

    fn live_counter(&self, key: &str) -> Option<i64> {
        let entry = self.counters.get(key)?;
        if entry.is_live() {
            return Some(entry.value);
        }
        drop(entry);
        self.counters.remove_if(key, |_, e| !e.is_live());
        None
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>> {
        self.check_available()?;
        Ok(self.live_counter(key))
    }

    async fn get_counters(&self, keys: &[String]) -> CacheResult<Vec<Option<i64>>> {
        self.check_available()?;
        Ok(keys.iter().map(|key| self.live_counter(key)).collect())
    }

    async fn set_counter(&self, key: &str, value: i64, ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        self.counters
            .insert(key.to_string(), Expiring::new(value, ttl));
        Ok(())
    }

    async fn set_counters(&self, entries: &[(String, i64)], ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        for (key, value) in entries {
            self.counters.insert(key.clone(), Expiring::new(*value, ttl));
        }
        Ok(())
    }

    async fn incr_counter(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.check_available()?;
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(0, NO_EXPIRY));
        if !entry.is_live() {
            *entry = Expiring::new(0, NO_EXPIRY);
        }
        entry.value += delta;
        Ok(entry.value)
    }

    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        let mut entry = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(HashSet::new(), ttl));
        if !entry.is_live() {
            entry.value.clear();
        }
        entry.value.insert(member.to_string());
        entry.expires_at = Instant::now() + ttl;
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> CacheResult<()> {
        self.check_available()?;
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.value.remove(member);
        }
        Ok(())
    }

    async fn is_member(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.check_available()?;
        Ok(self
            .sets
            .get(key)
            .map(|entry| entry.is_live() && entry.value.contains(member))
            .unwrap_or(false))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()> {
        self.check_available()?;
        self.sorted
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(member, score);
        Ok(())
    }

    async fn zrevrange(
        &self,
        key: &str,
        offset: usize,
        limit: usize,
    ) -> CacheResult<Vec<String>> {
        self.check_available()?;
        Ok(self
            .sorted
            .read()
            .get(key)
            .map(|set| set.range(offset, limit))
            .unwrap_or_default())
    }

    async fn zscore(&self, key: &str, member: &str) -> CacheResult<Option<f64>> {
        self.check_available()?;
        Ok(self
            .sorted
            .read()
            .get(key)
            .and_then(|set| set.scores.get(member).copied()))
    }
}
