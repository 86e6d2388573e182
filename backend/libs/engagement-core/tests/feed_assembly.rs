mod common;

use common::{config, harness, CountingStore, FailingAuthors, FlakyCounterBackend};
use engagement_core::{
    CounterKey, EngagementEngine, EngagementError, EngineParts, MemoryCacheBackend,
    MemoryCounterStore, NewVideo,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn ids(page: &[engagement_core::HydratedVideo]) -> Vec<i64> {
    page.iter().map(|h| h.video.id).collect()
}

#[tokio::test]
async fn test_pages_follow_rank_order() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let mut videos = Vec::new();
    for score in [50.0, 30.0, 90.0, 10.0] {
        let video = h.store.seed_video(author.id, 0, 0).await;
        h.engine.index().upsert(video.id, score).await.unwrap();
        videos.push(video);
    }

    let first = h.engine.feed_page(0, 2).await.unwrap().videos;
    assert_eq!(ids(&first), vec![videos[2].id, videos[0].id]);

    let second = h.engine.feed_page(2, 2).await.unwrap().videos;
    assert_eq!(ids(&second), vec![videos[1].id, videos[3].id]);

    assert!(h.engine.feed_page(4, 2).await.unwrap().videos.is_empty());
    assert_eq!(first[0].author.as_ref().map(|a| a.name.as_str()), Some("author"));
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_limit_is_clamped() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    for score in 0..5 {
        let video = h.store.seed_video(author.id, 0, 0).await;
        h.engine.index().upsert(video.id, score as f64).await.unwrap();
    }

    let empty = h.engine.feed_page(2, 0).await.unwrap();
    assert!(empty.videos.is_empty());
    assert_eq!(empty.next_offset, 2);
    assert_eq!(h.engine.feed_page(0, 500).await.unwrap().videos.len(), 3);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_ranked_id_without_row_is_skipped() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let video = h.store.seed_video(author.id, 0, 0).await;
    h.engine.index().upsert(video.id, 10.0).await.unwrap();
    h.engine.index().upsert(9999, 20.0).await.unwrap();

    let page = h.engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(ids(&page), vec![video.id]);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_cursor_advances_past_missing_rows() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let top = h.store.seed_video(author.id, 0, 0).await;
    let bottom = h.store.seed_video(author.id, 0, 0).await;
    h.engine.index().upsert(top.id, 90.0).await.unwrap();
    h.engine.index().upsert(9999, 80.0).await.unwrap();
    h.engine.index().upsert(bottom.id, 70.0).await.unwrap();

    let mut seen = Vec::new();
    let mut offset = 0;
    for _ in 0..3 {
        let page = h.engine.feed_page(offset, 2).await.unwrap();
        seen.extend(ids(&page.videos));
        offset = page.next_offset;
    }

    assert_eq!(seen, vec![top.id, bottom.id]);
    assert_eq!(offset, 3);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_offset_past_the_end_is_empty() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let video = h.store.seed_video(author.id, 0, 0).await;
    h.engine.index().upsert(video.id, 1.0).await.unwrap();

    let page = h.engine.feed_page(usize::MAX, 3).await.unwrap();
    assert!(page.videos.is_empty());
    assert_eq!(page.next_offset, usize::MAX);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_index_outage_fails_the_page() {
    let h = harness();
    h.backend.set_available(false);

    let result = h.engine.feed_page(0, 3).await;
    assert!(matches!(result, Err(EngagementError::Index(_))));
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_cached_counters_override_row_counts() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let video = h.store.seed_video(author.id, 1, 1).await;
    h.engine.index().upsert(video.id, 1.0).await.unwrap();
    h.engine
        .cache()
        .set_absolute_from_authority(CounterKey::video_favorites(video.id), 12)
        .await
        .unwrap();

    let page = h.engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(page[0].video.favorite_count, 12);
    assert_eq!(page[0].video.comment_count, 1);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_misses_are_backfilled_once() {
    let inner = Arc::new(MemoryCounterStore::new());
    let store = Arc::new(CountingStore::new(inner.clone()));
    let backend = Arc::new(MemoryCacheBackend::new());
    let (engine, worker) = EngagementEngine::start(
        &config(),
        EngineParts {
            store: store.clone(),
            cache_backend: backend,
            directory: inner.clone(),
            authors: inner.clone(),
        },
    );

    let author = inner.insert_user("author").await;
    for (favorites, comments) in [(4, 1), (2, 0)] {
        let video = inner.seed_video(author.id, favorites, comments).await;
        engine.index().upsert(video.id, favorites as f64).await.unwrap();
    }

    let first = engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(store.loads(), 2);
    assert_eq!(first[0].video.favorite_count, 4);
    assert_eq!(first[0].video.comment_count, 1);

    let second = engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(store.loads(), 2);
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(second[1].video.favorite_count, 2);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_counter_outage_degrades_to_row_counts() {
    let store = Arc::new(MemoryCounterStore::new());
    let backend = Arc::new(FlakyCounterBackend::new(Arc::new(MemoryCacheBackend::new())));
    let (engine, worker) = EngagementEngine::start(
        &config(),
        EngineParts {
            store: store.clone(),
            cache_backend: backend.clone(),
            directory: store.clone(),
            authors: store.clone(),
        },
    );

    let author = store.insert_user("author").await;
    let video = store.seed_video(author.id, 5, 2).await;
    engine.index().upsert(video.id, 1.0).await.unwrap();
    engine
        .cache()
        .set_absolute_from_authority(CounterKey::video_favorites(video.id), 99)
        .await
        .unwrap();
    backend.fail_counters.store(true, Ordering::SeqCst);

    let page = engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].video.favorite_count, 5);
    assert_eq!(page[0].video.comment_count, 2);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_author_outage_omits_authors() {
    let store = Arc::new(MemoryCounterStore::new());
    let (engine, worker) = EngagementEngine::start(
        &config(),
        EngineParts {
            store: store.clone(),
            cache_backend: Arc::new(MemoryCacheBackend::new()),
            directory: store.clone(),
            authors: Arc::new(FailingAuthors),
        },
    );

    let author = store.insert_user("author").await;
    let video = store.seed_video(author.id, 0, 0).await;
    engine.index().upsert(video.id, 1.0).await.unwrap();

    let page = engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(ids(&page), vec![video.id]);
    assert!(page[0].author.is_none());

    worker.shutdown().await;
}

#[tokio::test]
async fn test_published_video_enters_the_feed() {
    let h = harness();
    let author = h.store.insert_user("author").await;

    let video = h
        .engine
        .publish_video(NewVideo {
            author_id: author.id,
            title: "first upload".to_string(),
            play_url: "https://cdn.example.com/first.mp4".to_string(),
            cover_url: "https://cdn.example.com/first.jpg".to_string(),
        })
        .await
        .unwrap();

    // 1000 / 2^1.2 for a video with no engagement and no age
    let score = h.engine.index().score_of(video.id).await.unwrap().unwrap();
    assert!((score - 435.27).abs() < 0.1);

    let page = h.engine.feed_page(0, 3).await.unwrap().videos;
    assert_eq!(ids(&page), vec![video.id]);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_failed_seed_is_retried_in_background() {
    let h = harness();
    let author = h.store.insert_user("author").await;

    h.backend.set_available(false);
    let video = h
        .engine
        .publish_video(NewVideo {
            author_id: author.id,
            title: "during outage".to_string(),
            play_url: "https://cdn.example.com/outage.mp4".to_string(),
            cover_url: String::new(),
        })
        .await
        .unwrap();
    h.backend.set_available(true);
    h.engine.flush().await;

    assert!(h.engine.index().score_of(video.id).await.unwrap().is_some());
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_publish_requires_title_and_url() {
    let h = harness();
    let author = h.store.insert_user("author").await;

    let result = h
        .engine
        .publish_video(NewVideo {
            author_id: author.id,
            title: "  ".to_string(),
            play_url: "https://cdn.example.com/x.mp4".to_string(),
            cover_url: String::new(),
        })
        .await;
    assert!(matches!(result, Err(EngagementError::Validation(_))));
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_latest_feed_walks_back_by_creation_time() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let now = chrono::Utc::now();
    let mut videos = Vec::new();
    for hours_ago in [4, 3, 2, 1] {
        let created_at = now - chrono::Duration::hours(hours_ago);
        videos.push(h.store.seed_video_at(author.id, 0, 0, created_at).await);
    }

    // Page size clamps to 3
    let first = h.engine.latest_feed(None, 10).await.unwrap();
    assert_eq!(ids(&first.videos), vec![videos[3].id, videos[2].id, videos[1].id]);
    assert_eq!(first.next_before, Some(videos[1].created_at));
    assert_eq!(first.videos[0].author.as_ref().map(|a| a.id), Some(author.id));

    let second = h.engine.latest_feed(first.next_before, 10).await.unwrap();
    assert_eq!(ids(&second.videos), vec![videos[0].id]);

    let done = h.engine.latest_feed(second.next_before, 10).await.unwrap();
    assert!(done.videos.is_empty());
    assert_eq!(done.next_before, None);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_author_videos_are_newest_first() {
    let h = harness();
    let author = h.store.insert_user("author").await;
    let other = h.store.insert_user("other").await;
    let now = chrono::Utc::now();
    let old = h
        .store
        .seed_video_at(author.id, 0, 0, now - chrono::Duration::hours(2))
        .await;
    let new = h
        .store
        .seed_video_at(author.id, 0, 0, now - chrono::Duration::hours(1))
        .await;
    h.store.seed_video(other.id, 0, 0).await;

    let first = h.engine.author_videos(author.id, 1, 1).await.unwrap();
    assert_eq!(first.iter().map(|v| v.id).collect::<Vec<_>>(), vec![new.id]);

    let second = h.engine.author_videos(author.id, 2, 1).await.unwrap();
    assert_eq!(second.iter().map(|v| v.id).collect::<Vec<_>>(), vec![old.id]);

    let missing = h.engine.author_videos(author.id + 100, 1, 10).await;
    assert!(matches!(missing, Err(EngagementError::NotFound(_))));
    h.worker.shutdown().await;
}
