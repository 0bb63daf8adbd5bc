//! Interface definitions for the index client.
//!
//! This module defines the abstract `IndexClient` trait so the indexing sink
//! can be wired to any remote index (Solr, OpenSearch, or a mock in tests).

mod index_client;

pub use index_client::IndexClient;
