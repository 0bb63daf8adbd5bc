//! Processor module for the crawl indexer pipeline.
//!
//! Transforms crawled records into index documents.

mod document_builder;

pub use document_builder::DocumentBuilder;
