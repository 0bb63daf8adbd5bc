//! Message types passed from a consumer to the orchestrator.

use crawl_indexer_shared::Record;

/// Message forwarded by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// A record ready for routing to a sink replica.
    Record(Record),
    /// An upstream message that could not be turned into a record.
    Error(String),
    /// The upstream source is exhausted.
    End,
}
