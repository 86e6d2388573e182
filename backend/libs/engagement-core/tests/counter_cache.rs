mod common;

use common::{harness, CountingStore};
use engagement_core::{
    CounterCache, CounterKey, EngagementError, MemoryCacheBackend, MemoryCounterStore, Metric,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let inner = Arc::new(MemoryCounterStore::new());
    let store = Arc::new(CountingStore::new(inner.clone()));
    let cache = CounterCache::new(
        Arc::new(MemoryCacheBackend::new()),
        store.clone(),
        Duration::from_secs(60),
    );

    let video = inner.seed_video(1, 7, 0).await;
    let key = CounterKey::video_favorites(video.id);

    assert_eq!(cache.get_or_load(key).await.unwrap(), 7);
    assert_eq!(store.loads(), 1);

    assert_eq!(cache.get_or_load(key).await.unwrap(), 7);
    assert_eq!(store.loads(), 1);
}

#[tokio::test]
async fn test_expired_entry_reloads_from_authority() {
    let inner = Arc::new(MemoryCounterStore::new());
    let store = Arc::new(CountingStore::new(inner.clone()));
    let cache = CounterCache::new(
        Arc::new(MemoryCacheBackend::new()),
        store.clone(),
        Duration::from_millis(20),
    );

    let video = inner.seed_video(1, 3, 0).await;
    let key = CounterKey::video_favorites(video.id);

    cache.get_or_load(key).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    cache.get_or_load(key).await.unwrap();

    assert_eq!(store.loads(), 2);
}

#[tokio::test]
async fn test_reconcile_repairs_drifted_entries() {
    let h = harness();
    let video = h.store.seed_video(1, 5, 0).await;
    let key = CounterKey::video_favorites(video.id);
    h.engine.cache().set_absolute_from_authority(key, 40).await.unwrap();
    assert_eq!(h.engine.counter(key).await.unwrap(), 40);

    let written = h
        .engine
        .reconcile_counters(Metric::VideoFavorites, &[video.id])
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(h.engine.counter(key).await.unwrap(), 5);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_reconcile_batch_size_is_bounded() {
    let h = harness();

    let empty = h.engine.reconcile_counters(Metric::VideoFavorites, &[]).await;
    assert!(matches!(empty, Err(EngagementError::Validation(_))));

    let ids: Vec<i64> = (1..=1001).collect();
    let oversized = h.engine.reconcile_counters(Metric::VideoFavorites, &ids).await;
    assert!(matches!(oversized, Err(EngagementError::Validation(_))));
    h.worker.shutdown().await;
}
