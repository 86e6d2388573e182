use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{IndexerError, Result};
use crate::message::{document_id, ChangeKind, ChangeMessage};
use crate::sink::SearchSink;

/// One topic → index mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRoute {
    pub topic: String,
    pub index: String,
}

impl IndexRoute {
    pub fn new(topic: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            index: index.into(),
        }
    }

    /// Parse `topic=index` pairs separated by commas.
    pub fn parse_list(raw: &str) -> Vec<IndexRoute> {
        raw.split(',')
            .filter_map(|pair| {
                let (topic, index) = pair.split_once('=')?;
                let (topic, index) = (topic.trim(), index.trim());
                if topic.is_empty() || index.is_empty() {
                    return None;
                }
                Some(IndexRoute::new(topic, index))
            })
            .collect()
    }
}

/// What one message did to the index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub upserted: usize,
    pub deleted: usize,
    pub skipped: usize,
}

pub struct CdcIndexer {
    sink: Arc<dyn SearchSink>,
    routes: HashMap<String, String>,
}

impl CdcIndexer {
    pub fn new(sink: Arc<dyn SearchSink>, routes: Vec<IndexRoute>) -> Self {
        let routes = routes
            .into_iter()
            .map(|route| (route.topic, route.index))
            .collect();
        Self { sink, routes }
    }

    pub fn index_for(&self, topic: &str) -> Option<&str> {
        self.routes.get(topic).map(String::as_str)
    }

    /// Apply one change message from `topic`.
    ///
    /// Rows without an id are skipped. A sink failure aborts the message so the
    /// caller can redeliver it; rows already written are overwritten on replay.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Result<IndexSummary> {
        let index = self
            .index_for(topic)
            .ok_or_else(|| IndexerError::UnmappedTopic(topic.to_string()))?;
        let message = ChangeMessage::parse(payload)?;

        let mut summary = IndexSummary::default();
        if message.is_ddl {
            debug!(topic, table = %message.table, "Skipping DDL change");
            return Ok(summary);
        }

        let kind = message.change_kind();
        for row in message.rows() {
            let Some(id) = document_id(row) else {
                warn!(topic, table = %message.table, "Change row has no id, skipping");
                summary.skipped += 1;
                continue;
            };

            match &kind {
                ChangeKind::Insert | ChangeKind::Update => {
                    self.sink.upsert(index, &id, row).await?;
                    summary.upserted += 1;
                }
                ChangeKind::Delete => {
                    self.sink.delete(index, &id).await?;
                    summary.deleted += 1;
                }
                ChangeKind::Other(raw) => {
                    debug!(topic, kind = %raw, "Unsupported change type, skipping");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            topic,
            index,
            database = %message.database,
            table = %message.table,
            upserted = summary.upserted,
            deleted = summary.deleted,
            skipped = summary.skipped,
            "Applied change message"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes() {
        let routes = IndexRoute::parse_list("tiktok.video=videos, tiktok.user = users,broken,=x");
        assert_eq!(
            routes,
            vec![
                IndexRoute::new("tiktok.video", "videos"),
                IndexRoute::new("tiktok.user", "users"),
            ]
        );
    }
}
