/// HTTP mapping for engine errors
///
/// Every handler returns `Result<HttpResponse, ApiError>`; the body is always
/// `{"error": ..., "status": ...}`.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use cdc_indexer::IndexerError;
use engagement_core::EngagementError;
use std::fmt;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub EngagementError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        ApiError(err)
    }
}

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        match err {
            IndexerError::Decode(e) => ApiError(EngagementError::Validation(e.to_string())),
            IndexerError::UnmappedTopic(topic) => {
                ApiError(EngagementError::NotFound(format!("no index for topic {}", topic)))
            }
            other => ApiError(EngagementError::Upstream(other.to_string())),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngagementError::Validation(_) => StatusCode::BAD_REQUEST,
            EngagementError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            EngagementError::NotFound(_) => StatusCode::NOT_FOUND,
            EngagementError::EdgeState(_) => StatusCode::CONFLICT,
            EngagementError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngagementError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngagementError::Store(_) | EngagementError::Cache(_) | EngagementError::Index(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "Request failed");
        }

        HttpResponse::build(status).json(serde_json::json!({
            "error": self.0.to_string(),
            "status": status.as_u16(),
        }))
    }
}
