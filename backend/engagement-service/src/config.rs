/// Configuration management for Engagement Service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use cdc_indexer::IndexRoute;
use engagement_core::EngineConfig;
use resilience::{CircuitBreakerConfig, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub identity: IdentityConfig,
    pub engine: EngineConfig,
    /// Present only when `SEARCH_URL` is set
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    pub host: String,
    pub port: u16,
    /// Shared secret expected in `X-Internal-Token` on internal routes
    #[serde(skip_serializing)]
    pub internal_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Token verification against the identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub url: String,
    /// Per-call deadline
    pub request_timeout_ms: u64,
    pub breaker_min_requests: u32,
    pub breaker_failure_ratio: f64,
    pub breaker_open_secs: u64,
    pub rate_limit_per_second: u32,
    pub rate_limit_burst: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    /// `topic=index` pairs, comma separated
    pub routes: String,
    pub request_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8010),
            internal_token: std::env::var("INTERNAL_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections()),
            min_connections: env_or("DB_MIN_CONNECTIONS", default_min_connections()),
        };

        let redis = RedisConfig {
            url: std::env::var("REDIS_URL").context("REDIS_URL environment variable not set")?,
        };

        let breaker_defaults = CircuitBreakerConfig::default();
        let rate_defaults = RateLimitConfig::default();
        let identity = IdentityConfig {
            url: std::env::var("IDENTITY_SERVICE_URL")
                .context("IDENTITY_SERVICE_URL environment variable not set")?,
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", 2000),
            breaker_min_requests: env_or("BREAKER_MIN_REQUESTS", breaker_defaults.min_requests),
            breaker_failure_ratio: env_or("BREAKER_FAILURE_RATIO", breaker_defaults.failure_ratio),
            breaker_open_secs: env_or(
                "BREAKER_OPEN_SECS",
                breaker_defaults.open_timeout.as_secs(),
            ),
            rate_limit_per_second: env_or("RATE_LIMIT_PER_SECOND", rate_defaults.per_second),
            rate_limit_burst: env_or("RATE_LIMIT_BURST", rate_defaults.burst),
        };

        let engine_defaults = EngineConfig::default();
        let counter_ttl_secs = env_or("COUNTER_TTL_SECS", engine_defaults.counter_ttl_secs);
        let engine = EngineConfig {
            counter_ttl_secs,
            membership_ttl_secs: env_or("MEMBERSHIP_TTL_SECS", counter_ttl_secs),
            refresh_queue_capacity: env_or(
                "REFRESH_QUEUE_CAPACITY",
                engine_defaults.refresh_queue_capacity,
            ),
            refresh_concurrency: env_or("REFRESH_CONCURRENCY", engine_defaults.refresh_concurrency),
            feed_max_page: env_or("FEED_MAX_PAGE", engine_defaults.feed_max_page),
        };

        let search = std::env::var("SEARCH_URL").ok().map(|url| SearchConfig {
            url,
            routes: std::env::var("SEARCH_INDEX_ROUTES").unwrap_or_default(),
            request_timeout_ms: env_or("SEARCH_TIMEOUT_MS", 5000),
        });

        Ok(Config {
            app,
            database,
            redis,
            identity,
            engine,
            search,
        })
    }
}

impl IdentityConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            name: "identity-service".to_string(),
            min_requests: self.breaker_min_requests,
            failure_ratio: self.breaker_failure_ratio,
            open_timeout: Duration::from_secs(self.breaker_open_secs),
            ..CircuitBreakerConfig::default()
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            per_second: self.rate_limit_per_second,
            burst: self.rate_limit_burst,
        }
    }
}

impl SearchConfig {
    pub fn index_routes(&self) -> Vec<IndexRoute> {
        IndexRoute::parse_list(&self.routes)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
