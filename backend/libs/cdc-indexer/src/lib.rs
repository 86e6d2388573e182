//! Row-change capture into a search index
//!
//! Consumes canal-style change messages (one JSON object per database
//! transaction fragment) and mirrors the affected rows into search documents.
//! Each topic maps to one index; documents are keyed by the row's `id`
//! column, so replays overwrite rather than duplicate.

pub mod error;
pub mod indexer;
pub mod message;
pub mod sink;

pub use error::{IndexerError, Result};
pub use indexer::{CdcIndexer, IndexRoute, IndexSummary};
pub use message::{ChangeKind, ChangeMessage};
pub use sink::{ElasticsearchSink, SearchSink};
