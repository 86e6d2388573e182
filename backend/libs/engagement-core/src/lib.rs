//! Engagement counters and the ranked video feed
//!
//! The relational store is the single authority for edges and counts. The
//! counter cache, per-actor membership sets and the ranked index are derived
//! from it, refreshed in the background after each commit, and may lag.
//!
//! # Example
//!
//! ```rust,no_run
//! use engagement_core::{
//!     EngagementEngine, EngineConfig, EngineParts, MemoryCacheBackend, MemoryCounterStore,
//!     ToggleAction,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> engagement_core::Result<()> {
//!     let store = Arc::new(MemoryCounterStore::new());
//!     let (engine, worker) = EngagementEngine::start(
//!         &EngineConfig::default(),
//!         EngineParts {
//!             store: store.clone(),
//!             cache_backend: Arc::new(MemoryCacheBackend::new()),
//!             directory: store.clone(),
//!             authors: store,
//!         },
//!     );
//!
//!     engine.favorite(1, 42, ToggleAction::Add).await?;
//!     let page = engine.feed_page(0, 10).await?;
//!
//!     worker.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collaborators;
pub mod comments;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod keys;
pub mod metrics;
pub mod model;
pub mod ranking;
pub mod refresh;
pub mod store;
pub mod toggle;

pub use cache::{CacheBackend, CacheError, CounterCache, MemoryCacheBackend, RedisCacheBackend};
pub use collaborators::{AuthorDirectory, EntityDirectory, GuardedVerifier, TokenVerifier};
pub use config::EngineConfig;
pub use engine::{EngagementEngine, EngineParts};
pub use error::{EngagementError, Result};
pub use keys::CounterKey;
pub use metrics::EngineMetrics;
pub use model::{
    Author, Comment, Direction, EdgeKind, EdgeState, EntityId, EntityKind, FeedPage, HydratedVideo,
    LatestPage, Metric, NewVideo, ToggleAction, Video,
};
pub use ranking::{RankedIndex, RankedSlice};
pub use refresh::{RefreshHandle, RefreshJob, RefreshWorker};
pub use store::{CounterStore, MemoryCounterStore, PgCounterStore, PgDirectory};
pub use toggle::{RelationToggle, ToggleOutcome};
