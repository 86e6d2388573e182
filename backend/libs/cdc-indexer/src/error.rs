use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("failed to decode change message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no index mapped for topic {0}")]
    UnmappedTopic(String),

    #[error("invalid search url: {0}")]
    InvalidUrl(String),

    #[error("search transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search backend rejected {operation} on {index}/{id}: status {status}")]
    Rejected {
        operation: &'static str,
        index: String,
        id: String,
        status: u16,
    },
}

pub type Result<T> = std::result::Result<T, IndexerError>;
