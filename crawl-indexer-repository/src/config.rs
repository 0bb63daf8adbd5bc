//! Endpoint configuration for index clients.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::IndexClientError;
use crate::interfaces::IndexClient;
use crate::opensearch::{IndexConfig, OpenSearchClient, DEFAULT_INDEX_NAME};
use crate::solr::SolrClient;

/// Default Solr core URL.
pub const DEFAULT_SOLR_URL: &str = "http://localhost:8983/solr/crawler";

/// Supported remote index backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBackend {
    #[default]
    Solr,
    OpenSearch,
}

impl FromStr for IndexBackend {
    type Err = IndexClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solr" => Ok(Self::Solr),
            "opensearch" => Ok(Self::OpenSearch),
            other => Err(IndexClientError::configuration(format!(
                "Unknown index backend '{}', expected 'solr' or 'opensearch'",
                other
            ))),
        }
    }
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solr => f.write_str("solr"),
            Self::OpenSearch => f.write_str("opensearch"),
        }
    }
}

/// Where and how to reach the remote index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEndpoint {
    pub backend: IndexBackend,
    /// Solr core URL or OpenSearch node URL.
    pub url: String,
    /// Target index name. Only used by OpenSearch; Solr encodes the core in the URL.
    pub index_name: String,
}

impl Default for IndexEndpoint {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Solr,
            url: DEFAULT_SOLR_URL.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
        }
    }
}

/// Build the index client for an endpoint.
///
/// Each call returns an independent client, so every sink replica can own
/// its own connection.
pub fn connect(endpoint: &IndexEndpoint) -> Result<Arc<dyn IndexClient>, IndexClientError> {
    let client: Arc<dyn IndexClient> = match endpoint.backend {
        IndexBackend::Solr => Arc::new(SolrClient::new(&endpoint.url)?),
        IndexBackend::OpenSearch => Arc::new(OpenSearchClient::new(
            &endpoint.url,
            IndexConfig::new(endpoint.index_name.clone()),
        )?),
    };
    Ok(client)
}
