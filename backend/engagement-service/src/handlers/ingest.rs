use actix_web::{web, HttpRequest, HttpResponse};
use engagement_core::EngagementError;

use super::require_internal;
use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Apply one canal change message published on `topic`.
///
/// Redelivery is safe: documents are keyed by row id.
pub async fn ingest_change(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_internal(&req, &state)?;

    let Some(indexer) = state.indexer.as_ref() else {
        return Err(ApiError(EngagementError::NotFound(
            "search indexing is not configured".to_string(),
        )));
    };

    let summary = indexer.handle(&path, &body).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "upserted": summary.upserted,
        "deleted": summary.deleted,
        "skipped": summary.skipped,
    })))
}
