//! The record delivered to the indexing sink.

use std::sync::Arc;

use crate::metadata::Metadata;

/// One fetched and parsed unit flowing through the crawl pipeline.
///
/// Not a wire type; consumers parse their own input format into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The record's unique identifier. Never empty for a sink-bound record.
    pub url: String,
    /// Raw fetched payload. Absent or empty content produces no document.
    pub content: Option<Vec<u8>>,
    /// Parser and fetcher metadata, shared with status events.
    pub metadata: Arc<Metadata>,
}

impl Record {
    /// Create a record with content and metadata.
    pub fn new(url: impl Into<String>, content: impl Into<Vec<u8>>, metadata: Metadata) -> Self {
        Self {
            url: url.into(),
            content: Some(content.into()),
            metadata: Arc::new(metadata),
        }
    }

    /// Create a record without content.
    pub fn empty(url: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            url: url.into(),
            content: None,
            metadata: Arc::new(metadata),
        }
    }

    /// Whether the record carries a non-empty payload.
    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(|content| !content.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content() {
        assert!(Record::new("http://a/", "x", Metadata::new()).has_content());
        assert!(!Record::new("http://a/", "", Metadata::new()).has_content());
        assert!(!Record::empty("http://a/", Metadata::new()).has_content());
    }
}
