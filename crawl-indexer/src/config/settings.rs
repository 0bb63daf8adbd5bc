//! Settings read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::IndexingError;
use crawl_indexer_pipeline::{OverflowPolicy, SinkConfig};
use crawl_indexer_repository::{IndexBackend, IndexEndpoint};

/// Default number of index sink replicas.
const DEFAULT_PARALLELISM: usize = 1;

/// Log output format of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = IndexingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(IndexingError::config(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                other
            ))),
        }
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: IndexEndpoint,
    pub sink: SinkConfig,
    /// Number of index sink replicas.
    pub parallelism: usize,
    /// JSON-lines input file; stdin when `None`.
    pub input: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_BACKEND`: `solr` or `opensearch` (default: solr)
    /// - `INDEX_URL`: Solr core URL or OpenSearch node URL (default: http://localhost:8983/solr/crawler)
    /// - `INDEX_NAME`: OpenSearch index name (default: crawler)
    /// - `INDEX_COMMIT_SIZE`: pending documents that trigger a commit (default: 250)
    /// - `INDEX_MAX_DOCS_BATCH`: documents per add request (default: 100)
    /// - `INDEX_MAX_PENDING_DOCS`: cap on pending documents (default: 10000)
    /// - `INDEX_OVERFLOW_POLICY`: `reject` or `shed-oldest` (default: reject)
    /// - `INDEX_PARALLELISM`: number of sink replicas (default: 1)
    /// - `CRAWL_INPUT`: path of the JSON-lines input (default: stdin)
    /// - `LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut endpoint = IndexEndpoint::default();
        if let Some(backend) = get("INDEX_BACKEND") {
            endpoint.backend = backend.parse::<IndexBackend>()?;
        }
        if let Some(url) = get("INDEX_URL") {
            endpoint.url = url;
        }
        if let Some(name) = get("INDEX_NAME") {
            endpoint.index_name = name;
        }

        let mut sink = SinkConfig::default();
        if let Some(value) = get("INDEX_COMMIT_SIZE") {
            sink.commit_size = parse_number("INDEX_COMMIT_SIZE", &value)?;
        }
        if let Some(value) = get("INDEX_MAX_DOCS_BATCH") {
            sink.max_docs_per_batch = parse_number("INDEX_MAX_DOCS_BATCH", &value)?;
        }
        if let Some(value) = get("INDEX_MAX_PENDING_DOCS") {
            sink.max_pending_docs = parse_number("INDEX_MAX_PENDING_DOCS", &value)?;
        }
        if let Some(value) = get("INDEX_OVERFLOW_POLICY") {
            sink.overflow_policy = value.parse::<OverflowPolicy>()?;
        }
        sink.validate()?;

        let parallelism = match get("INDEX_PARALLELISM") {
            Some(value) => parse_number("INDEX_PARALLELISM", &value)?,
            None => DEFAULT_PARALLELISM,
        };
        if parallelism == 0 {
            return Err(IndexingError::config("INDEX_PARALLELISM must be at least 1"));
        }

        let log_format = match get("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            endpoint,
            sink,
            parallelism,
            input: get("CRAWL_INPUT").map(PathBuf::from),
            log_format,
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, IndexingError> {
    value
        .trim()
        .parse()
        .map_err(|e| IndexingError::config(format!("{} must be a positive integer: {}", key, e)))
}
