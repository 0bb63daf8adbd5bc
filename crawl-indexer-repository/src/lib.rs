//! # Crawl Indexer Repository
//!
//! This crate provides the client interface to the remote search index used
//! by the crawl indexer. It includes the error type, the `IndexClient` trait,
//! and concrete implementations for Solr and OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod solr;

pub use config::{connect, IndexBackend, IndexEndpoint};
pub use errors::IndexClientError;
pub use interfaces::IndexClient;
pub use opensearch::OpenSearchClient;
pub use solr::SolrClient;
