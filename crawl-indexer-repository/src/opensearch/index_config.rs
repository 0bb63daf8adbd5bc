//! OpenSearch index configuration and mappings.
//!
//! This module defines the index name and the mappings used for crawled pages.

use serde_json::{json, Value};

/// Default name of the crawl index.
pub const DEFAULT_INDEX_NAME: &str = "crawler";

/// Target index for an OpenSearch client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// The index documents are written to.
    pub name: String,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_NAME)
    }
}

/// Get the index settings and mappings for the crawl index.
///
/// - **text**: Page text with the standard analyzer
/// - **title / description**: Full text with a raw keyword sub-field on title
/// - **Keyword fields**: url, host, content type and language for filtering
/// - **keywords_t**: Multi-valued full-text keywords
pub fn get_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "id": {
                    "type": "keyword"
                },
                "url": {
                    "type": "keyword"
                },
                "text": {
                    "type": "text"
                },
                "title": {
                    "type": "text",
                    "fields": {
                        "raw": {
                            "type": "keyword"
                        }
                    }
                },
                "description": {
                    "type": "text"
                },
                "keywords_t": {
                    "type": "text"
                },
                "content_type": {
                    "type": "keyword"
                },
                "host": {
                    "type": "keyword"
                },
                "lang": {
                    "type": "keyword"
                },
                "crawl_date": {
                    "type": "date"
                }
            }
        }
    })
}
