//! Engine error types

use thiserror::Error;

use crate::cache::CacheError;

#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional edge write found the edge in an unexpected state.
    #[error("Edge state conflict: {0}")]
    EdgeState(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Ranked index error: {0}")]
    Index(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<sqlx::Error> for EngagementError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngagementError::NotFound("row not found".to_string()),
            other => EngagementError::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngagementError>;
