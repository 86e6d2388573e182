use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use engagement_core::{EngagementError, EntityId, NewVideo};
use serde::Deserialize;
use tracing::debug;

use super::{authenticate, authenticate_optional, default_limit, default_page, require_id};
use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishVideoRequest {
    pub title: String,
    pub play_url: String,
    #[serde(default)]
    pub cover_url: String,
}

pub async fn publish_video(
    req: HttpRequest,
    body: web::Json<PublishVideoRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let author_id = authenticate(&req, &state).await?;
    let body = body.into_inner();

    let video = state
        .engine
        .publish_video(NewVideo {
            author_id,
            title: body.title,
            play_url: body.play_url,
            cover_url: body.cover_url,
        })
        .await?;

    Ok(HttpResponse::Created().json(video))
}

/// Deepest rank a feed page may start at.
pub const MAX_FEED_OFFSET: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

fn default_feed_limit() -> usize {
    10
}

/// Ranked feed. Guests may read it; a token, if sent, must be valid.
pub async fn get_feed(
    req: HttpRequest,
    query: web::Query<FeedQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if query.offset > MAX_FEED_OFFSET {
        return Err(ApiError(EngagementError::Validation(format!(
            "offset must be at most {}",
            MAX_FEED_OFFSET
        ))));
    }
    let viewer = authenticate_optional(&req, &state).await?;

    let page = state.engine.feed_page(query.offset, query.limit).await?;
    debug!(?viewer, offset = query.offset, returned = page.videos.len(), "Feed page");

    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct LatestFeedQuery {
    /// RFC 3339; omitted means now
    pub before: Option<DateTime<Utc>>,
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

/// Newest videos first, paged by creation time.
pub async fn get_latest_feed(
    req: HttpRequest,
    query: web::Query<LatestFeedQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    authenticate_optional(&req, &state).await?;

    let page = state.engine.latest_feed(query.before, query.limit).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct UserVideosQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// An author's published videos, newest first.
pub async fn list_user_videos(
    path: web::Path<EntityId>,
    query: web::Query<UserVideosQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let author_id = path.into_inner();
    require_id("user_id", author_id)?;

    let videos = state
        .engine
        .author_videos(author_id, query.page, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "videos": videos })))
}
