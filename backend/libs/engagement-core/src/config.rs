use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the engine's derived layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_counter_ttl_secs")]
    pub counter_ttl_secs: u64,
    #[serde(default = "default_counter_ttl_secs")]
    pub membership_ttl_secs: u64,
    #[serde(default = "default_refresh_queue_capacity")]
    pub refresh_queue_capacity: usize,
    #[serde(default = "default_refresh_concurrency")]
    pub refresh_concurrency: usize,
    #[serde(default = "default_feed_max_page")]
    pub feed_max_page: usize,
}

fn default_counter_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_refresh_queue_capacity() -> usize {
    1024
}

fn default_refresh_concurrency() -> usize {
    16
}

fn default_feed_max_page() -> usize {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            counter_ttl_secs: default_counter_ttl_secs(),
            membership_ttl_secs: default_counter_ttl_secs(),
            refresh_queue_capacity: default_refresh_queue_capacity(),
            refresh_concurrency: default_refresh_concurrency(),
            feed_max_page: default_feed_max_page(),
        }
    }
}

impl EngineConfig {
    pub fn counter_ttl(&self) -> Duration {
        Duration::from_secs(self.counter_ttl_secs)
    }

    pub fn membership_ttl(&self) -> Duration {
        Duration::from_secs(self.membership_ttl_secs)
    }
}
