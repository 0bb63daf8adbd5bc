//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexClient` using the
//! OpenSearch Rust client. `add` is a bulk request and `commit` refreshes the
//! index so submitted documents become searchable.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesRefreshParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::IndexClientError;
use crate::interfaces::IndexClient;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crawl_indexer_shared::IndexDocument;

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::new("crawler"))?;
/// client.ping().await?;
/// client.add(&documents).await?;
/// client.commit().await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
    closed: AtomicBool,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The target index
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(IndexClientError)` - If connection setup fails
    pub fn new(url: &str, index_config: IndexConfig) -> Result<Self, IndexClientError> {
        let parsed_url = Url::parse(url)
            .map_err(|e| IndexClientError::configuration(format!("Invalid OpenSearch URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexClientError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            index = %index_config.name,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), IndexClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexClientError::connection("OpenSearch client is closed"));
        }
        Ok(())
    }

    /// Build the bulk request body: one `index` action per document, keyed by url.
    fn bulk_body(&self, documents: &[IndexDocument]) -> Result<Vec<JsonBody<Value>>, IndexClientError> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);

        for doc in documents {
            body.push(json!({"index": {"_index": self.index_config.name, "_id": doc.id}}).into());
            let source = serde_json::to_value(doc)
                .map_err(|e| IndexClientError::serialization(e.to_string()))?;
            body.push(source.into());
        }

        Ok(body)
    }

    /// Count the items of a bulk response that carry an error.
    fn failed_items(response_body: &Value) -> usize {
        if response_body.get("errors").and_then(Value::as_bool) != Some(true) {
            return 0;
        }

        response_body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.get("index").and_then(|i| i.get("error")).is_some())
                    .count()
            })
            .unwrap_or(0)
    }

    async fn check_status(response: Response) -> Result<Response, IndexClientError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, "OpenSearch request failed");
        Err(IndexClientError::rejected(status.as_u16(), error_body))
    }

    /// Create the crawl index with its mappings if it does not exist yet.
    async fn ensure_index_exists(&self) -> Result<(), IndexClientError> {
        let index = self.index_config.name.as_str();

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| IndexClientError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(get_index_settings())
            .send()
            .await
            .map_err(|e| IndexClientError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another replica may have created it between the two requests.
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(IndexClientError::rejected(status.as_u16(), error_body));
        }

        info!(index = %index, "Created index");
        Ok(())
    }
}

#[async_trait]
impl IndexClient for OpenSearchClient {
    fn name(&self) -> &str {
        "opensearch"
    }

    /// Check cluster health, then make sure the target index exists.
    #[instrument(skip(self), fields(index = %self.index_config.name))]
    async fn ping(&self) -> Result<(), IndexClientError> {
        self.ensure_open()?;

        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| IndexClientError::connection(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| IndexClientError::ping(format!("Unreadable health response: {}", e)))?;
        let status = health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        if status != "green" && status != "yellow" {
            warn!(status = %status, "OpenSearch cluster is unhealthy");
            return Err(IndexClientError::ping(format!("Cluster status is {}", status)));
        }

        debug!(status = %status, "OpenSearch cluster is healthy");
        self.ensure_index_exists().await
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn add(&self, documents: &[IndexDocument]) -> Result<(), IndexClientError> {
        self.ensure_open()?;

        if documents.is_empty() {
            return Ok(());
        }

        let body = self.bulk_body(documents)?;

        let response = self
            .client
            .bulk(BulkParts::Index(&self.index_config.name))
            .body(body)
            .send()
            .await
            .map_err(|e| IndexClientError::add(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| IndexClientError::add(format!("Unreadable bulk response: {}", e)))?;

        let failed = Self::failed_items(&response_body);
        if failed > 0 {
            error!(failed = failed, count = documents.len(), "Bulk request had failures");
            return Err(IndexClientError::add(format!(
                "{} of {} documents were rejected",
                failed,
                documents.len()
            )));
        }

        debug!(count = documents.len(), "Documents submitted to OpenSearch");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index_config.name))]
    async fn commit(&self) -> Result<(), IndexClientError> {
        self.ensure_open()?;

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[self.index_config.name.as_str()]))
            .send()
            .await
            .map_err(|e| IndexClientError::commit(e.to_string()))?;
        Self::check_status(response).await?;

        debug!("Index refreshed");
        Ok(())
    }

    async fn close(&self) -> Result<(), IndexClientError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(index = %self.index_config.name, "Closed OpenSearch client");
        }
        Ok(())
    }
}
