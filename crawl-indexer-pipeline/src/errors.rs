//! Error types for the crawl indexer pipeline.

use crawl_indexer_repository::IndexClientError;
use thiserror::Error;

/// Errors that can occur in the crawl indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Record content could not be decoded into text.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The record cannot be indexed as delivered.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The pending batch reached its configured cap.
    #[error("Batch is full: {pending} documents pending (max {max})")]
    BatchFull { pending: usize, max: usize },

    /// Error from the remote index.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexClientError),

    /// Invalid sink or pipeline configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from the consumer component.
    #[error("Consumer error: {0}")]
    ConsumerError(String),

    /// Error parsing an upstream message.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The pipeline graph declaration is invalid.
    #[error("Topology error: {0}")]
    TopologyError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl PipelineError {
    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a batch full error.
    pub fn batch_full(pending: usize, max: usize) -> Self {
        Self::BatchFull { pending, max }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a consumer error.
    pub fn consumer(msg: impl Into<String>) -> Self {
        Self::ConsumerError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a topology error.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::TopologyError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}
