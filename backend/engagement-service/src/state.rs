use cdc_indexer::CdcIndexer;
use engagement_core::{EngagementEngine, TokenVerifier};
use std::sync::Arc;

/// Shared by every worker thread's `App`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EngagementEngine>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Row-change ingestion, when a search backend is configured
    pub indexer: Option<Arc<CdcIndexer>>,
    /// Shared secret for `/internal` routes; unset closes them
    pub internal_token: Option<String>,
}
