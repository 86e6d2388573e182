//! Key-value backend shared by the counter cache, membership sets and the
//! ranked index.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use super::{CacheError, CacheResult};

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>>;

    /// One value per key, in key order.
    async fn get_counters(&self, keys: &[String]) -> CacheResult<Vec<Option<i64>>>;

    async fn set_counter(&self, key: &str, value: i64, ttl: Duration) -> CacheResult<()>;

    /// Write many counters in one round trip.
    async fn set_counters(&self, entries: &[(String, i64)], ttl: Duration) -> CacheResult<()>;

    /// Add `delta` and return the new value. An absent key starts at 0.
    async fn incr_counter(&self, key: &str, delta: i64) -> CacheResult<i64>;

    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()>;

    async fn remove_member(&self, key: &str, member: &str) -> CacheResult<()>;

    async fn is_member(&self, key: &str, member: &str) -> CacheResult<bool>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()>;

    /// Members ordered by descending score, `limit` of them starting at `offset`.
    async fn zrevrange(&self, key: &str, offset: usize, limit: usize)
        -> CacheResult<Vec<String>>;

    async fn zscore(&self, key: &str, member: &str) -> CacheResult<Option<f64>>;
}

/// Inclusive ZREVRANGE bounds for a window, or `None` when the window is
/// empty or not addressable. Redis reads negative indices from the tail, so
/// nothing here may wrap.
fn rank_bounds(offset: usize, limit: usize) -> Option<(isize, isize)> {
    if limit == 0 {
        return None;
    }
    let stop = offset.checked_add(limit - 1)?;
    Some((isize::try_from(offset).ok()?, isize::try_from(stop).ok()?))
}

/// Redis-backed implementation over a shared `ConnectionManager`.
#[derive(Clone)]
pub struct RedisCacheBackend {
    redis: ConnectionManager,
}

impl RedisCacheBackend {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>> {
        let mut conn = self.redis.clone();
        let value: Option<i64> = conn.get(key).await?;
        Ok(value)
    }

    async fn get_counters(&self, keys: &[String]) -> CacheResult<Vec<Option<i64>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        // MGET always replies with an array, even for a single key
        let values: Vec<Option<i64>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;

        if values.len() != keys.len() {
            return Err(CacheError::InvalidData(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn set_counter(&self, key: &str, value: i64, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn set_counters(&self, entries: &[(String, i64)], ttl: Duration) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set_ex(key, *value, ttl.as_secs()).ignore();
        }

        let mut conn = self.redis.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr_counter(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.redis.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn add_member(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()> {
        let mut pipe = redis::pipe();
        pipe.sadd(key, member)
            .ignore()
            .expire(key, ttl.as_secs() as i64)
            .ignore();

        let mut conn = self.redis.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.srem(key, member).await?;
        Ok(())
    }

    async fn is_member(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.redis.clone();
        let present: bool = conn.sismember(key, member).await?;
        Ok(present)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrevrange(
        &self,
        key: &str,
        offset: usize,
        limit: usize,
    ) -> CacheResult<Vec<String>> {
        let Some((start, stop)) = rank_bounds(offset, limit) else {
            return Ok(Vec::new());
        };

        let mut conn = self.redis.clone();
        let members: Vec<String> = conn.zrevrange(key, start, stop).await?;
        Ok(members)
    }

    async fn zscore(&self, key: &str, member: &str) -> CacheResult<Option<f64>> {
        let mut conn = self.redis.clone();
        let score: Option<f64> = conn.zscore(key, member).await?;
        Ok(score)
    }
}
