//! Index document model.
//!
//! This module defines the document shape written to the search index for
//! every crawled page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::metadata::Metadata;

/// Metadata keys read when deriving an [`IndexDocument`].
pub mod metadata_keys {
    pub const TITLE: &str = "parse.title";
    pub const DESCRIPTION: &str = "parse.description";
    pub const KEYWORDS: &str = "parse.keywords";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const LANGUAGE: &str = "parse.lang";
}

/// A crawled page as stored in the search index.
///
/// The document id is the page url, so re-indexing a url replaces the
/// previous document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Unique document id (the page url).
    pub id: String,
    /// The page url.
    pub url: String,
    /// Decoded page text.
    pub text: String,
    /// When this document was built.
    pub crawl_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Every keyword the parser found, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords_t: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Host component of the url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl IndexDocument {
    /// Derive a document from a url, its decoded text and its metadata.
    ///
    /// Singular fields take the first metadata value; keywords keep the full
    /// list. A url without a parseable host simply has no `host` field.
    pub fn derive(
        url: impl Into<String>,
        text: impl Into<String>,
        metadata: &Metadata,
        crawl_date: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        let host = Self::host_of(&url);
        let first = |key: &str| metadata.first(key).map(str::to_string);

        Self {
            id: url.clone(),
            url,
            text: text.into(),
            crawl_date,
            title: first(metadata_keys::TITLE),
            description: first(metadata_keys::DESCRIPTION),
            keywords_t: metadata.values(metadata_keys::KEYWORDS).to_vec(),
            content_type: first(metadata_keys::CONTENT_TYPE),
            host,
            lang: first(metadata_keys::LANGUAGE),
        }
    }

    fn host_of(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        let mut metadata = Metadata::new();
        metadata.add_value(metadata_keys::TITLE, "First title");
        metadata.add_value(metadata_keys::TITLE, "Second title");
        metadata.add_value(metadata_keys::DESCRIPTION, "A page");
        metadata.add_value(metadata_keys::KEYWORDS, "rust");
        metadata.add_value(metadata_keys::KEYWORDS, "search");
        metadata.add_value(metadata_keys::CONTENT_TYPE, "text/html");
        metadata.add_value(metadata_keys::LANGUAGE, "en");
        metadata
    }

    #[test]
    fn test_derive_fields() {
        let now = Utc::now();
        let doc = IndexDocument::derive(
            "https://example.com/docs/page",
            "hello",
            &sample_metadata(),
            now,
        );

        assert_eq!(doc.id, "https://example.com/docs/page");
        assert_eq!(doc.url, doc.id);
        assert_eq!(doc.text, "hello");
        assert_eq!(doc.crawl_date, now);
        assert_eq!(doc.title.as_deref(), Some("First title"));
        assert_eq!(doc.description.as_deref(), Some("A page"));
        assert_eq!(doc.keywords_t, vec!["rust", "search"]);
        assert_eq!(doc.content_type.as_deref(), Some("text/html"));
        assert_eq!(doc.host.as_deref(), Some("example.com"));
        assert_eq!(doc.lang.as_deref(), Some("en"));
    }

    #[test]
    fn test_derive_without_metadata() {
        let doc = IndexDocument::derive("https://example.com/", "x", &Metadata::new(), Utc::now());

        assert!(doc.title.is_none());
        assert!(doc.keywords_t.is_empty());
        assert_eq!(doc.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_unparseable_url_has_no_host() {
        let doc = IndexDocument::derive("not a url", "x", &Metadata::new(), Utc::now());

        assert_eq!(doc.id, "not a url");
        assert!(doc.host.is_none());
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let doc = IndexDocument::derive("https://example.com/", "x", &Metadata::new(), Utc::now());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["id"], "https://example.com/");
        assert_eq!(json["text"], "x");
        assert!(json.get("title").is_none());
        assert!(json.get("keywords_t").is_none());
        assert!(json["crawl_date"].is_string());
    }
}
