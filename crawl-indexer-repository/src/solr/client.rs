//! Solr client implementation.
//!
//! This module provides the `IndexClient` implementation for a Solr core,
//! using the JSON update handler for `add` and an explicit `commit=true`
//! update request as the durability point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::IndexClientError;
use crate::interfaces::IndexClient;
use crawl_indexer_shared::IndexDocument;

/// Default timeout for a single request to Solr.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a single Solr core.
///
/// # Example
///
/// ```ignore
/// let client = SolrClient::new("http://localhost:8983/solr/crawler")?;
/// client.ping().await?;
/// client.add(&documents).await?;
/// client.commit().await?;
/// ```
pub struct SolrClient {
    http: Client,
    core_url: String,
    closed: AtomicBool,
}

impl SolrClient {
    /// Create a new client for the Solr core at `core_url`.
    ///
    /// # Arguments
    ///
    /// * `core_url` - The core URL (e.g., "http://localhost:8983/solr/crawler")
    ///
    /// # Returns
    ///
    /// * `Ok(SolrClient)` - A new client instance
    /// * `Err(IndexClientError)` - If the URL is invalid or the HTTP client cannot be built
    pub fn new(core_url: &str) -> Result<Self, IndexClientError> {
        let parsed = Url::parse(core_url)
            .map_err(|e| IndexClientError::configuration(format!("Invalid Solr URL: {}", e)))?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IndexClientError::connection(e.to_string()))?;

        let core_url = parsed.as_str().trim_end_matches('/').to_string();

        info!(url = %core_url, "Created Solr client");

        Ok(Self {
            http,
            core_url,
            closed: AtomicBool::new(false),
        })
    }

    /// The core URL requests are sent to.
    pub fn core_url(&self) -> &str {
        &self.core_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.core_url, path)
    }

    fn ensure_open(&self) -> Result<(), IndexClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexClientError::connection("Solr client is closed"));
        }
        Ok(())
    }

    /// Turn a non-success response into a rejection carrying the body.
    async fn check_status(response: Response) -> Result<Response, IndexClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Solr request failed");
        Err(IndexClientError::rejected(status.as_u16(), body))
    }
}

#[async_trait]
impl IndexClient for SolrClient {
    fn name(&self) -> &str {
        "solr"
    }

    #[instrument(skip(self), fields(url = %self.core_url))]
    async fn ping(&self) -> Result<(), IndexClientError> {
        self.ensure_open()?;

        let response = self
            .http
            .get(self.endpoint("admin/ping"))
            .query(&[("wt", "json")])
            .send()
            .await
            .map_err(|e| IndexClientError::connection(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexClientError::ping(format!("Unreadable ping response: {}", e)))?;

        match body.get("status").and_then(Value::as_str) {
            Some("OK") | None => {
                debug!("Solr ping succeeded");
                Ok(())
            }
            Some(other) => Err(IndexClientError::ping(format!(
                "Solr reported status {}",
                other
            ))),
        }
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn add(&self, documents: &[IndexDocument]) -> Result<(), IndexClientError> {
        self.ensure_open()?;

        if documents.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_vec(documents)
            .map_err(|e| IndexClientError::serialization(e.to_string()))?;

        let response = self
            .http
            .post(self.endpoint("update"))
            .query(&[("wt", "json")])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| IndexClientError::add(e.to_string()))?;
        Self::check_status(response).await?;

        debug!(count = documents.len(), "Documents submitted to Solr");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn commit(&self) -> Result<(), IndexClientError> {
        self.ensure_open()?;

        let response = self
            .http
            .post(self.endpoint("update"))
            .query(&[("commit", "true"), ("wt", "json")])
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| IndexClientError::commit(e.to_string()))?;
        Self::check_status(response).await?;

        debug!("Solr commit succeeded");
        Ok(())
    }

    async fn close(&self) -> Result<(), IndexClientError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(url = %self.core_url, "Closed Solr client");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crawl_indexer_shared::Metadata;
    use httpmock::{Method, MockServer};

    fn document(url: &str) -> IndexDocument {
        IndexDocument::derive(url, "body", &Metadata::new(), Utc::now())
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = SolrClient::new("http://localhost:8983/solr/crawler/").unwrap();
        assert_eq!(client.core_url(), "http://localhost:8983/solr/crawler");
        assert_eq!(
            client.endpoint("update"),
            "http://localhost:8983/solr/crawler/update"
        );
    }

    #[test]
    fn test_invalid_url() {
        let result = SolrClient::new("not a url");
        assert!(matches!(result, Err(IndexClientError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_ping_ok() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(Method::GET).path("/solr/crawler/admin/ping");
                then.status(200).json_body(json!({"status": "OK"}));
            })
            .await;

        let client = SolrClient::new(&server.url("/solr/crawler")).unwrap();
        client.ping().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_unhealthy_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(Method::GET).path("/solr/crawler/admin/ping");
                then.status(200).json_body(json!({"status": "FAILED"}));
            })
            .await;

        let client = SolrClient::new(&server.url("/solr/crawler")).unwrap();
        let result = client.ping().await;

        assert!(matches!(result, Err(IndexClientError::PingError(_))));
    }

    #[tokio::test]
    async fn test_add_posts_documents() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(Method::POST)
                    .path("/solr/crawler/update")
                    .body_contains("\"id\":\"https://example.com/a\"")
                    .body_contains("\"id\":\"https://example.com/b\"");
                then.status(200).json_body(json!({"responseHeader": {"status": 0}}));
            })
            .await;

        let client = SolrClient::new(&server.url("/solr/crawler")).unwrap();
        client
            .add(&[document("https://example.com/a"), document("https://example.com/b")])
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_commit_rejected() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(Method::POST)
                    .path("/solr/crawler/update")
                    .query_param("commit", "true");
                then.status(503).body("unavailable");
            })
            .await;

        let client = SolrClient::new(&server.url("/solr/crawler")).unwrap();
        let result = client.commit().await;

        mock.assert_async().await;
        match result {
            Err(IndexClientError::Rejected { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_client_refuses_requests() {
        let client = SolrClient::new("http://localhost:8983/solr/crawler").unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();

        let result = client.add(&[document("https://example.com/a")]).await;
        assert!(matches!(result, Err(IndexClientError::ConnectionError(_))));
    }
}
