use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{IndexerError, Result};

/// Destination for mirrored rows. Both operations are idempotent per id.
#[async_trait]
pub trait SearchSink: Send + Sync {
    async fn upsert(&self, index: &str, id: &str, document: &Map<String, Value>) -> Result<()>;

    /// Deleting a document that is already gone succeeds.
    async fn delete(&self, index: &str, id: &str) -> Result<()>;
}

/// Elasticsearch document API over plain HTTP.
#[derive(Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: Url,
}

impl ElasticsearchSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| IndexerError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(IndexerError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// `{base}/{index}/_doc/{id}` with each segment percent-encoded.
    fn document_url(&self, index: &str, id: &str) -> Url {
        let mut url = self.base_url.clone();
        // Bases that cannot carry a path are rejected in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([index, "_doc", id]);
        }
        url
    }
}

#[async_trait]
impl SearchSink for ElasticsearchSink {
    async fn upsert(&self, index: &str, id: &str, document: &Map<String, Value>) -> Result<()> {
        let response = self
            .client
            .put(self.document_url(index, id))
            .json(document)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Rejected {
                operation: "index",
                index: index.to_string(),
                id: id.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(index, id, "Indexed document");
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.document_url(index, id))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(index, id, "Document already absent");
            return Ok(());
        }
        if !status.is_success() {
            return Err(IndexerError::Rejected {
                operation: "delete",
                index: index.to_string(),
                id: id.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(index, id, "Deleted document");
        Ok(())
    }
}
