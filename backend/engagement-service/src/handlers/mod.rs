/// HTTP handlers for engagement endpoints
///
/// - Favorites: toggle and list a user's favorited videos
/// - Relations: follow/unfollow, following lists, follower counts
/// - Comments: post/delete and list
/// - Videos: publish, per-author lists, the ranked and latest feeds
/// - Ingest: row-change messages for the search index
/// - Counters: internal cache reconciliation
pub mod comments;
pub mod counters;
pub mod favorites;
pub mod ingest;
pub mod relations;
pub mod videos;

use actix_web::{http::header::AUTHORIZATION, web, HttpRequest, HttpResponse};
use engagement_core::{EngagementError, EntityId, ToggleOutcome};
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

pub const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";
pub const INTERNAL_TOKEN_HEADER: &str = "X-Internal-Token";

/// Route table, shared by `main` and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .service(
            web::scope("/internal")
                .route("/cdc/{topic}", web::post().to(ingest::ingest_change))
                .route(
                    "/counters/reconcile",
                    web::post().to(counters::reconcile_counters),
                ),
        )
        .service(
            web::scope("/api/v1")
                .service(
                    web::resource("/favorites")
                        .route(web::post().to(favorites::favorite_action))
                        .route(web::get().to(favorites::list_favorites)),
                )
                .route("/relations", web::post().to(relations::relation_action))
                .route("/following", web::get().to(relations::list_following))
                .route("/users/{user_id}/counts", web::get().to(relations::user_counts))
                .service(
                    web::resource("/comments")
                        .route(web::post().to(comments::comment_action))
                        .route(web::get().to(comments::list_comments)),
                )
                .route("/users/{user_id}/videos", web::get().to(videos::list_user_videos))
                .route("/videos", web::post().to(videos::publish_video))
                .route("/feed", web::get().to(videos::get_feed))
                .route("/feed/latest", web::get().to(videos::get_latest_feed)),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// List endpoints page from 1.
pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_limit() -> u32 {
    10
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: &'static str,
    pub outcome: &'static str,
}

impl From<ToggleOutcome> for ActionResponse {
    fn from(outcome: ToggleOutcome) -> Self {
        Self {
            message: "success",
            outcome: outcome.label(),
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller from `Authorization: Bearer` and the refresh token header.
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<EntityId> {
    let token = bearer_token(req).ok_or_else(|| {
        ApiError(EngagementError::Unauthenticated(
            "missing bearer token".to_string(),
        ))
    })?;
    let refresh_token = req
        .headers()
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    Ok(state.verifier.verify(token, refresh_token).await?)
}

/// Like `authenticate`, but a request without a token is a guest (`None`).
pub async fn authenticate_optional(req: &HttpRequest, state: &AppState) -> Result<Option<EntityId>> {
    if bearer_token(req).is_none() {
        return Ok(None);
    }
    authenticate(req, state).await.map(Some)
}

/// Internal routes take the configured shared secret; with none configured
/// they reject every call.
pub fn require_internal(req: &HttpRequest, state: &AppState) -> Result<()> {
    let Some(expected) = state.internal_token.as_deref() else {
        return Err(ApiError(EngagementError::Unauthenticated(
            "internal endpoints are disabled".to_string(),
        )));
    };
    let provided = req
        .headers()
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        return Err(ApiError(EngagementError::Unauthenticated(
            "invalid internal token".to_string(),
        )));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn require_id(name: &str, id: EntityId) -> Result<()> {
    if id <= 0 {
        return Err(ApiError(EngagementError::Validation(format!(
            "{} is required",
            name
        ))));
    }
    Ok(())
}
