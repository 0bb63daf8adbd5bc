//! Error types for the crawl indexer repository.

mod index_client_error;

pub use index_client_error::IndexClientError;
