use actix_web::{web, HttpRequest, HttpResponse};
use engagement_core::{EntityId, ToggleAction};
use serde::Deserialize;
use tracing::debug;

use super::{authenticate, default_limit, default_page, require_id, ActionResponse};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FavoriteActionRequest {
    pub video_id: EntityId,
    /// 1 = favorite, 2 = unfavorite
    pub action_type: i32,
}

pub async fn favorite_action(
    req: HttpRequest,
    body: web::Json<FavoriteActionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_id("video_id", body.video_id)?;
    let action = ToggleAction::try_from(body.action_type)?;
    let user_id = authenticate(&req, &state).await?;

    let outcome = state.engine.favorite(user_id, body.video_id, action).await?;
    debug!(user_id, video_id = body.video_id, ?outcome, "Favorite action");

    Ok(HttpResponse::Ok().json(ActionResponse::from(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct FavoriteListQuery {
    pub user_id: EntityId,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Videos favorited by `user_id`, most recent first.
pub async fn list_favorites(
    req: HttpRequest,
    query: web::Query<FavoriteListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_id("user_id", query.user_id)?;
    authenticate(&req, &state).await?;

    let videos = state
        .engine
        .favorite_videos(query.user_id, query.page, query.limit)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "videos": videos })))
}
