//! Index client trait definition.
//!
//! This module defines the abstract interface to the remote search index,
//! allowing for different backend implementations (Solr, OpenSearch, etc.).

use async_trait::async_trait;

use crate::errors::IndexClientError;
use crawl_indexer_shared::IndexDocument;

/// Abstract interface to a remote search index.
///
/// The indexing sink treats `add` followed by `commit` as a single logical
/// transaction: if either call fails, the whole flush is retried later with
/// the same documents.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Short backend name used in log fields.
    fn name(&self) -> &str;

    /// Check that the remote index is reachable and healthy.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index answered and reported itself healthy
    /// * `Err(IndexClientError)` - If the index is unreachable or unhealthy
    async fn ping(&self) -> Result<(), IndexClientError>;

    /// Submit documents to the index.
    ///
    /// Documents with an id already present in the index replace the stored
    /// version. Submitted documents are not guaranteed to be visible until
    /// `commit` succeeds.
    ///
    /// # Arguments
    ///
    /// * `documents` - Slice of documents to submit
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If every document was accepted
    /// * `Err(IndexClientError)` - If the request failed or any document was rejected
    async fn add(&self, documents: &[IndexDocument]) -> Result<(), IndexClientError>;

    /// Make every previously added document durable and searchable.
    async fn commit(&self) -> Result<(), IndexClientError>;

    /// Release the connection to the index.
    ///
    /// Calling `close` more than once is harmless.
    async fn close(&self) -> Result<(), IndexClientError>;
}
