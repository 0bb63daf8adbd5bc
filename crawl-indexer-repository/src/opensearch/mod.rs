//! OpenSearch implementation of the index client.
//!
//! This module provides a concrete implementation of `IndexClient` using
//! OpenSearch as the backend.

mod client;
mod index_config;

pub use client::OpenSearchClient;
pub use index_config::{get_index_settings, IndexConfig, DEFAULT_INDEX_NAME};
