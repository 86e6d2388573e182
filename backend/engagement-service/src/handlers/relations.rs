use actix_web::{web, HttpRequest, HttpResponse};
use engagement_core::{CounterKey, EntityId, ToggleAction};
use serde::{Deserialize, Serialize};

use super::{authenticate, default_limit, default_page, require_id, ActionResponse};
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RelationActionRequest {
    pub to_user_id: EntityId,
    /// 1 = follow, 2 = unfollow
    pub action_type: i32,
}

pub async fn relation_action(
    req: HttpRequest,
    body: web::Json<RelationActionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_id("to_user_id", body.to_user_id)?;
    let action = ToggleAction::try_from(body.action_type)?;
    let user_id = authenticate(&req, &state).await?;

    let outcome = state.engine.follow(user_id, body.to_user_id, action).await?;
    Ok(HttpResponse::Ok().json(ActionResponse::from(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct FollowingQuery {
    pub user_id: EntityId,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub async fn list_following(
    req: HttpRequest,
    query: web::Query<FollowingQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_id("user_id", query.user_id)?;
    authenticate(&req, &state).await?;

    let users = state
        .engine
        .following(query.user_id, query.page, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "users": users })))
}

#[derive(Debug, Serialize)]
pub struct UserCounts {
    pub user_id: EntityId,
    pub follower_count: i64,
    pub following_count: i64,
}

/// Public follower/following counts, served from the counter cache.
pub async fn user_counts(path: web::Path<EntityId>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    require_id("user_id", user_id)?;

    let (follower_count, following_count) = tokio::try_join!(
        state.engine.counter(CounterKey::user_followers(user_id)),
        state.engine.counter(CounterKey::user_following(user_id)),
    )?;

    Ok(HttpResponse::Ok().json(UserCounts {
        user_id,
        follower_count,
        following_count,
    }))
}
