//! # Crawl Indexer
//!
//! Entry point and configuration for running the crawl indexer: crawled
//! records are read from a JSON-lines source, batched by one or more
//! indexing sink replicas and committed to Solr or OpenSearch.

pub mod config;

pub use config::{Dependencies, LogFormat, Settings};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] crawl_indexer_pipeline::PipelineError),

    /// Index client error.
    #[error("Index error: {0}")]
    IndexError(#[from] crawl_indexer_repository::IndexClientError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
