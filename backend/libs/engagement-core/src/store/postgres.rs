use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::debug;

use super::CounterStore;
use crate::collaborators::{AuthorDirectory, EntityDirectory};
use crate::error::{EngagementError, Result};
use crate::model::{
    Author, Comment, Direction, EdgeKind, EdgeState, EntityId, EntityKind, Metric, NewComment,
    NewVideo, Video, VideoStats,
};

const VIDEO_COLUMNS: &str =
    "id, author_id, title, play_url, cover_url, favorite_count, comment_count, created_at";

const COMMENT_COLUMNS: &str = "id, video_id, user_id, parent_id, content, created_at, deleted_at";

/// Owning table and column of each counter.
fn counter_column(metric: Metric) -> (&'static str, &'static str) {
    match metric {
        Metric::VideoFavorites => ("videos", "favorite_count"),
        Metric::VideoComments => ("videos", "comment_count"),
        Metric::UserFollowers => ("users", "follower_count"),
        Metric::UserFollowing => ("users", "following_count"),
    }
}

fn entity_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Video => "videos",
        EntityKind::User => "users",
    }
}

/// PostgreSQL-backed counter store
#[derive(Clone)]
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add `delta` to one counter, never going below zero.
    async fn bump_counter(
        tx: &mut Transaction<'_, Postgres>,
        metric: Metric,
        id: EntityId,
        delta: i64,
    ) -> Result<()> {
        let (table, column) = counter_column(metric);
        let sql = format!(
            "UPDATE {table} SET {column} = GREATEST({column} + $1, 0) WHERE id = $2",
            table = table,
            column = column
        );

        let result = sqlx::query(&sql)
            .bind(delta)
            .bind(id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngagementError::NotFound(format!(
                "{} {} does not exist",
                metric.entity_kind(),
                id
            )));
        }
        Ok(())
    }

    async fn write_edge(
        tx: &mut Transaction<'_, Postgres>,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    ) -> Result<bool> {
        let sql = match direction {
            Direction::Create => {
                r#"
                INSERT INTO edges (kind, actor_id, target_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (kind, actor_id, target_id) DO NOTHING
                "#
            }
            Direction::Restore => {
                r#"
                UPDATE edges
                SET deleted_at = NULL, updated_at = NOW()
                WHERE kind = $1 AND actor_id = $2 AND target_id = $3
                  AND deleted_at IS NOT NULL
                "#
            }
            Direction::Delete => {
                r#"
                UPDATE edges
                SET deleted_at = NOW(), updated_at = NOW()
                WHERE kind = $1 AND actor_id = $2 AND target_id = $3
                  AND deleted_at IS NULL
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(kind.as_str())
            .bind(actor_id)
            .bind(target_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn edge_state(&self, kind: EdgeKind, actor_id: EntityId, target_id: EntityId) -> Result<EdgeState> {
        let deleted: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT deleted_at IS NOT NULL
            FROM edges
            WHERE kind = $1 AND actor_id = $2 AND target_id = $3
            "#,
        )
        .bind(kind.as_str())
        .bind(actor_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match deleted {
            None => EdgeState::Absent,
            Some(true) => EdgeState::Deleted,
            Some(false) => EdgeState::Active,
        })
    }

    async fn apply_edge_mutation(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        target_id: EntityId,
        direction: Direction,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if !Self::write_edge(&mut tx, kind, actor_id, target_id, direction).await? {
            tx.rollback().await?;
            return Err(EngagementError::EdgeState(format!(
                "{} {}->{} is not {}",
                kind,
                actor_id,
                target_id,
                direction.required_state()
            )));
        }

        for (metric, owner) in kind.owned_counters(actor_id, target_id) {
            // Dropping the transaction on error rolls it back
            Self::bump_counter(&mut tx, metric, owner, direction.delta()).await?;
        }

        tx.commit().await?;

        debug!(%kind, actor_id, target_id, %direction, "Edge mutation committed");
        Ok(())
    }

    async fn list_edge_targets(
        &self,
        kind: EdgeKind,
        actor_id: EntityId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EntityId>> {
        let ids: Vec<EntityId> = sqlx::query_scalar(
            r#"
            SELECT target_id
            FROM edges
            WHERE kind = $1 AND actor_id = $2 AND deleted_at IS NULL
            ORDER BY updated_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(kind.as_str())
        .bind(actor_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn load_count(&self, metric: Metric, id: EntityId) -> Result<i64> {
        let (table, column) = counter_column(metric);
        let sql = format!("SELECT {} FROM {} WHERE id = $1", column, table);

        let count: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(count.unwrap_or(0))
    }

    async fn batch_load_counts(&self, metric: Metric, ids: &[EntityId]) -> Result<HashMap<EntityId, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let (table, column) = counter_column(metric);
        let sql = format!("SELECT id, {} FROM {} WHERE id = ANY($1)", column, table);

        let rows: Vec<(EntityId, i64)> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    async fn insert_video(&self, new: NewVideo) -> Result<Video> {
        let sql = format!(
            r#"
            INSERT INTO videos (author_id, title, play_url, cover_url)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        );

        let video = sqlx::query_as::<_, Video>(&sql)
            .bind(new.author_id)
            .bind(&new.title)
            .bind(&new.play_url)
            .bind(&new.cover_url)
            .fetch_one(&self.pool)
            .await?;

        Ok(video)
    }

    async fn load_videos(&self, ids: &[EntityId]) -> Result<Vec<Video>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM videos WHERE id = ANY($1)", VIDEO_COLUMNS);
        let videos = sqlx::query_as::<_, Video>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(videos)
    }

    async fn video_stats(&self, id: EntityId) -> Result<VideoStats> {
        let row: Option<(i64, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT favorite_count, comment_count, created_at
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let (favorite_count, comment_count, created_at) =
            row.ok_or_else(|| EngagementError::NotFound(format!("video {} does not exist", id)))?;

        Ok(VideoStats {
            favorite_count,
            comment_count,
            created_at,
        })
    }

    async fn list_author_videos(&self, author_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Video>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM videos
            WHERE author_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            VIDEO_COLUMNS
        );

        let videos = sqlx::query_as::<_, Video>(&sql)
            .bind(author_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(videos)
    }

    async fn list_videos_before(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<Video>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM videos
            WHERE created_at < $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            VIDEO_COLUMNS
        );

        let videos = sqlx::query_as::<_, Video>(&sql)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(videos)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        Self::bump_counter(&mut tx, Metric::VideoComments, new.video_id, 1).await?;

        let sql = format!(
            r#"
            INSERT INTO comments (video_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        );
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(new.video_id)
            .bind(new.user_id)
            .bind(new.parent_id)
            .bind(&new.content)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn soft_delete_comment(&self, comment_id: EntityId, video_id: EntityId, user_id: EntityId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE comments
            SET deleted_at = NOW()
            WHERE id = $1 AND video_id = $2 AND user_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(comment_id)
        .bind(video_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(EngagementError::NotFound(format!(
                "comment {} on video {}",
                comment_id, video_id
            )));
        }

        Self::bump_counter(&mut tx, Metric::VideoComments, video_id, -1).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_comments(&self, video_id: EntityId, limit: i64, offset: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM comments
            WHERE video_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            COMMENT_COLUMNS
        );

        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(video_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(comments)
    }
}

/// Entity existence and author lookups over the shared `users` and `videos` tables.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityDirectory for PgDirectory {
    async fn exists(&self, kind: EntityKind, id: EntityId) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            entity_table(kind)
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

#[async_trait]
impl AuthorDirectory for PgDirectory {
    async fn batch_get(&self, ids: &[EntityId]) -> Result<HashMap<EntityId, Author>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT id, name, avatar_url
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(authors.into_iter().map(|a| (a.id, a)).collect())
    }
}
