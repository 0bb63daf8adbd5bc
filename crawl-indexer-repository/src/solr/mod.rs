//! Solr implementation of the index client.
//!
//! This module talks to a single Solr core over its JSON update API.

mod client;

pub use client::SolrClient;
