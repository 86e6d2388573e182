use actix_web::{web, HttpRequest, HttpResponse};
use engagement_core::{EntityId, Metric};
use serde::Deserialize;
use tracing::info;

use super::require_internal;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub metric: Metric,
    pub ids: Vec<EntityId>,
}

/// Re-seed cached counters from the database, for repairing drift after an
/// outage or a bulk import.
pub async fn reconcile_counters(
    req: HttpRequest,
    body: web::Json<ReconcileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_internal(&req, &state)?;

    let written = state
        .engine
        .reconcile_counters(body.metric, &body.ids)
        .await?;
    info!(metric = %body.metric, requested = body.ids.len(), written, "Reconcile requested");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "reconciled": written })))
}
