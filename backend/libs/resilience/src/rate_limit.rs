/// Token-bucket admission control
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained refill rate in tokens per second
    pub per_second: u32,
    /// Bucket capacity
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 100,
            burst: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(String),
}

/// Non-blocking token bucket. `try_acquire` never waits.
pub struct TokenBucket {
    limiter: DefaultDirectRateLimiter,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let per_second = NonZeroU32::new(config.per_second)
            .ok_or_else(|| RateLimitError::InvalidConfig("per_second must be > 0".into()))?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| RateLimitError::InvalidConfig("burst must be > 0".into()))?;

        let quota = Quota::per_second(per_second).allow_burst(burst);
        Ok(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket").finish_non_exhaustive()
    }
}
