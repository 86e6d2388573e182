use actix_web::{web, HttpRequest, HttpResponse};
use engagement_core::{EngagementError, EntityId, ToggleAction};
use serde::Deserialize;

use super::{authenticate, default_limit, default_page, require_id};
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// `action_type` 1 posts `content`, 2 deletes `comment_id`.
#[derive(Debug, Deserialize)]
pub struct CommentActionRequest {
    pub video_id: EntityId,
    pub action_type: i32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub comment_id: Option<EntityId>,
}

pub async fn comment_action(
    req: HttpRequest,
    body: web::Json<CommentActionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_id("video_id", body.video_id)?;
    let action = ToggleAction::try_from(body.action_type)?;
    let user_id = authenticate(&req, &state).await?;

    match action {
        ToggleAction::Add => {
            let comment = state
                .engine
                .post_comment(user_id, body.video_id, &body.content, body.parent_id)
                .await?;
            Ok(HttpResponse::Created().json(serde_json::json!({
                "message": "success",
                "comment": comment,
            })))
        }
        ToggleAction::Remove => {
            let comment_id = body.comment_id.filter(|id| *id > 0).ok_or_else(|| {
                ApiError(EngagementError::Validation(
                    "comment_id is required".to_string(),
                ))
            })?;
            state
                .engine
                .delete_comment(user_id, comment_id, body.video_id)
                .await?;
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "success",
                "comment_id": comment_id,
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub video_id: EntityId,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub async fn list_comments(
    query: web::Query<CommentListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_id("video_id", query.video_id)?;

    let comments = state
        .engine
        .list_comments(query.video_id, query.page, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "comments": comments })))
}
