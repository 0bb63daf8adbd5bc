//! Status events reported for processed records.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

/// Crawl status of a url, as understood by the status-tracking stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum Status {
    Discovered,
    /// Accepted into the indexing pipeline.
    Fetched,
    FetchError,
    Redirection,
    /// Processing failed before or during batching.
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Discovered => "DISCOVERED",
            Status::Fetched => "FETCHED",
            Status::FetchError => "FETCH_ERROR",
            Status::Redirection => "REDIRECTION",
            Status::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Outcome of one record, emitted on the status stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub url: String,
    /// The metadata the record arrived with.
    pub metadata: Arc<Metadata>,
    pub status: Status,
}

impl StatusEvent {
    pub fn new(url: impl Into<String>, metadata: Arc<Metadata>, status: Status) -> Self {
        Self {
            url: url.into(),
            metadata,
            status,
        }
    }
}
