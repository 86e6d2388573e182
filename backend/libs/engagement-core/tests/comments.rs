mod common;

use common::harness;
use engagement_core::{CounterKey, EngagementError};

#[tokio::test]
async fn test_post_and_retract_move_comment_count() {
    let h = harness();
    let user = h.store.insert_user("alice").await;
    let video = h.store.seed_video(user.id, 0, 0).await;

    let first = h
        .engine
        .post_comment(user.id, video.id, "  nice  ", None)
        .await
        .unwrap();
    assert_eq!(first.content, "nice");
    h.engine.flush().await;
    let second = h
        .engine
        .post_comment(user.id, video.id, "reply", Some(first.id))
        .await
        .unwrap();
    assert_eq!(second.parent_id, Some(first.id));
    h.engine.flush().await;

    assert_eq!(
        h.engine.counter(CounterKey::video_comments(video.id)).await.unwrap(),
        2
    );
    let listed = h.engine.list_comments(video.id, 1, 10).await.unwrap();
    assert_eq!(
        listed.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );

    h.engine.delete_comment(user.id, first.id, video.id).await.unwrap();
    h.engine.flush().await;

    assert_eq!(
        h.engine.counter(CounterKey::video_comments(video.id)).await.unwrap(),
        1
    );
    assert_eq!(h.engine.list_comments(video.id, 1, 10).await.unwrap().len(), 1);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_comments_raise_score() {
    let h = harness();
    let user = h.store.insert_user("alice").await;
    let video = h.store.seed_video(user.id, 0, 0).await;

    h.engine.post_comment(user.id, video.id, "first", None).await.unwrap();
    h.engine.flush().await;

    // Two points per comment on top of the freshness term
    let score = h.engine.index().score_of(video.id).await.unwrap().unwrap();
    assert!(score > 437.0 && score < 437.4);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_only_the_author_can_retract() {
    let h = harness();
    let alice = h.store.insert_user("alice").await;
    let mallory = h.store.insert_user("mallory").await;
    let video = h.store.seed_video(alice.id, 0, 0).await;
    let comment = h
        .engine
        .post_comment(alice.id, video.id, "mine", None)
        .await
        .unwrap();
    h.engine.flush().await;

    let result = h.engine.delete_comment(mallory.id, comment.id, video.id).await;
    assert!(matches!(result, Err(EngagementError::NotFound(_))));
    h.engine.flush().await;

    assert_eq!(
        h.engine.counter(CounterKey::video_comments(video.id)).await.unwrap(),
        1
    );
    assert_eq!(h.engine.list_comments(video.id, 1, 10).await.unwrap().len(), 1);
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_double_retract_is_not_found() {
    let h = harness();
    let user = h.store.insert_user("alice").await;
    let video = h.store.seed_video(user.id, 0, 0).await;
    let comment = h
        .engine
        .post_comment(user.id, video.id, "oops", None)
        .await
        .unwrap();
    h.engine.flush().await;

    h.engine.delete_comment(user.id, comment.id, video.id).await.unwrap();
    let again = h.engine.delete_comment(user.id, comment.id, video.id).await;
    assert!(matches!(again, Err(EngagementError::NotFound(_))));

    h.engine.flush().await;
    assert_eq!(
        h.engine.counter(CounterKey::video_comments(video.id)).await.unwrap(),
        0
    );
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_invalid_comments_are_rejected() {
    let h = harness();
    let user = h.store.insert_user("alice").await;
    let video = h.store.seed_video(user.id, 0, 0).await;

    let empty = h.engine.post_comment(user.id, video.id, "   ", None).await;
    assert!(matches!(empty, Err(EngagementError::Validation(_))));

    let long = "x".repeat(1001);
    let too_long = h.engine.post_comment(user.id, video.id, &long, None).await;
    assert!(matches!(too_long, Err(EngagementError::Validation(_))));

    let missing = h.engine.post_comment(user.id, 4040, "hello", None).await;
    assert!(matches!(missing, Err(EngagementError::NotFound(_))));
    h.worker.shutdown().await;
}

#[tokio::test]
async fn test_comment_pages() {
    let h = harness();
    let user = h.store.insert_user("alice").await;
    let video = h.store.seed_video(user.id, 0, 0).await;
    for n in 0..5 {
        h.engine
            .post_comment(user.id, video.id, &format!("comment {}", n), None)
            .await
            .unwrap();
    }

    let first = h.engine.list_comments(video.id, 1, 2).await.unwrap();
    let third = h.engine.list_comments(video.id, 3, 2).await.unwrap();
    assert_eq!(first[0].content, "comment 4");
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].content, "comment 0");
    // Page 0 is treated as the first page
    assert_eq!(h.engine.list_comments(video.id, 0, 2).await.unwrap(), first);
    h.worker.shutdown().await;
}
