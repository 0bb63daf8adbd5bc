//! Index client error types.
//!
//! This module defines the errors that can occur while talking to the remote
//! search index.

use thiserror::Error;

/// Errors that can occur during index client operations.
#[derive(Debug, Clone, Error)]
pub enum IndexClientError {
    /// Failed to reach the search index.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The liveness check failed.
    #[error("Ping error: {0}")]
    PingError(String),

    /// Submitting documents failed.
    #[error("Add error: {0}")]
    AddError(String),

    /// The commit request failed.
    #[error("Commit error: {0}")]
    CommitError(String),

    /// Releasing the connection failed.
    #[error("Close error: {0}")]
    CloseError(String),

    /// Failed to serialize documents for the search index.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The search index answered with a non-success status.
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Invalid endpoint configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl IndexClientError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a ping error.
    pub fn ping(msg: impl Into<String>) -> Self {
        Self::PingError(msg.into())
    }

    /// Create an add error.
    pub fn add(msg: impl Into<String>) -> Self {
        Self::AddError(msg.into())
    }

    /// Create a commit error.
    pub fn commit(msg: impl Into<String>) -> Self {
        Self::CommitError(msg.into())
    }

    /// Create a close error.
    pub fn close(msg: impl Into<String>) -> Self {
        Self::CloseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a rejection error from an HTTP status and response body.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Whether the failure looks transient (worth retrying on the next flush).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::AddError(msg) | Self::CommitError(msg) | Self::PingError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("rate limit")
            }
            Self::CloseError(_) | Self::SerializationError(_) | Self::ConfigurationError(_) => {
                false
            }
        }
    }
}
