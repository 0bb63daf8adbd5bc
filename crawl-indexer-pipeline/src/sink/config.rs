//! Configuration for the indexing sink.

use std::fmt;
use std::str::FromStr;

use crate::errors::PipelineError;

/// Default number of pending documents that triggers a flush.
pub const DEFAULT_COMMIT_SIZE: usize = 250;

/// Default maximum number of documents per `add` request.
pub const DEFAULT_MAX_DOCS_PER_BATCH: usize = 100;

/// Default cap on pending documents kept for retry.
pub const DEFAULT_MAX_PENDING_DOCS: usize = 10_000;

/// What the accumulator does when the pending batch reaches its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Refuse the new document; its record fails and can be redelivered.
    #[default]
    RejectNew,
    /// Drop the oldest pending document to make room.
    ShedOldest,
}

impl FromStr for OverflowPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "reject-new" => Ok(Self::RejectNew),
            "shed-oldest" | "shed" => Ok(Self::ShedOldest),
            other => Err(PipelineError::config(format!(
                "Unknown overflow policy '{}', expected 'reject' or 'shed-oldest'",
                other
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectNew => f.write_str("reject"),
            Self::ShedOldest => f.write_str("shed-oldest"),
        }
    }
}

/// Configuration for the indexing sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Number of pending documents that triggers a flush.
    pub commit_size: usize,
    /// Maximum number of documents sent in one `add` request.
    pub max_docs_per_batch: usize,
    /// Maximum number of documents kept pending across failed flushes.
    pub max_pending_docs: usize,
    /// Behavior once `max_pending_docs` is reached.
    pub overflow_policy: OverflowPolicy,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            commit_size: DEFAULT_COMMIT_SIZE,
            max_docs_per_batch: DEFAULT_MAX_DOCS_PER_BATCH,
            max_pending_docs: DEFAULT_MAX_PENDING_DOCS,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl SinkConfig {
    /// Config with a custom commit size and defaults for everything else.
    pub fn with_commit_size(commit_size: usize) -> Self {
        Self {
            commit_size,
            ..Self::default()
        }
    }

    /// Check that the sizes are usable together.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.commit_size == 0 {
            return Err(PipelineError::config("commit_size must be greater than zero"));
        }
        if self.max_docs_per_batch == 0 {
            return Err(PipelineError::config(
                "max_docs_per_batch must be greater than zero",
            ));
        }
        if self.max_pending_docs < self.commit_size {
            return Err(PipelineError::config(format!(
                "max_pending_docs ({}) must be at least commit_size ({})",
                self.max_pending_docs, self.commit_size
            )));
        }
        Ok(())
    }
}
