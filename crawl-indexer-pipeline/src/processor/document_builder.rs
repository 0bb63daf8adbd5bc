//! Document builder implementation.
//!
//! Decodes record content and derives the `IndexDocument` for a record.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::errors::PipelineError;
use crawl_indexer_shared::{IndexDocument, Record};

/// Builds index documents from crawled records.
///
/// Content is decoded as UTF-8. Invalid UTF-8 is a decode error for that
/// record only; the builder holds no state between records.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentBuilder;

impl DocumentBuilder {
    /// Create a new document builder.
    pub fn new() -> Self {
        Self
    }

    /// Build the document for `record`, stamped with the current time.
    pub fn build(&self, record: &Record) -> Result<IndexDocument, PipelineError> {
        self.build_at(record, Utc::now())
    }

    /// Build the document for `record` with an explicit crawl date.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexDocument)` - The derived document
    /// * `Err(PipelineError::InvalidRecord)` - If the url is empty
    /// * `Err(PipelineError::DecodeError)` - If the content is not valid UTF-8
    #[instrument(skip(self, record, crawl_date), fields(url = %record.url))]
    pub fn build_at(
        &self,
        record: &Record,
        crawl_date: DateTime<Utc>,
    ) -> Result<IndexDocument, PipelineError> {
        if record.url.trim().is_empty() {
            return Err(PipelineError::invalid_record("record has an empty url"));
        }

        let content = record.content.as_deref().unwrap_or_default();
        let text = std::str::from_utf8(content).map_err(|e| {
            PipelineError::decode(format!("content of {} is not valid UTF-8: {}", record.url, e))
        })?;

        let doc = IndexDocument::derive(record.url.as_str(), text, &record.metadata, crawl_date);
        debug!(
            has_title = doc.title.is_some(),
            keywords = doc.keywords_t.len(),
            "Built index document"
        );
        Ok(doc)
    }
}
