//! Consumer module for the crawl indexer pipeline.
//!
//! Reads crawled records from an upstream source and forwards them to the
//! orchestrator.

mod json_lines;
mod messages;

pub use json_lines::JsonLinesConsumer;
pub use messages::StreamMessage;
