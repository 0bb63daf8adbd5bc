//! # Crawl Indexer Shared
//!
//! Data model shared by the crawl indexer crates.
//!
//! - [`Record`]: one fetched and parsed unit delivered to the indexing sink
//! - [`Metadata`]: multi-valued metadata attached to a record
//! - [`IndexDocument`]: the projection of a record sent to the search index
//! - [`StatusEvent`]: the outcome reported downstream for each record

mod document;
mod metadata;
mod record;
mod status;

pub use document::{metadata_keys, IndexDocument};
pub use metadata::Metadata;
pub use record::Record;
pub use status::{Status, StatusEvent};
