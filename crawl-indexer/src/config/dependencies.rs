//! Dependency initialization and wiring for the crawl indexer.

use std::sync::Arc;

use tokio::io::{self, AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Settings;
use crate::IndexingError;
use crawl_indexer_pipeline::consumer::JsonLinesConsumer;
use crawl_indexer_pipeline::topology::{crawl_topology, Router, DEFAULT_STREAM, INDEX_STAGE};
use crawl_indexer_pipeline::{prepare_replicas, ChannelCollector, Orchestrator};
use crawl_indexer_repository::connect;
use crawl_indexer_shared::StatusEvent;

/// Reader behind the consumer: a file or stdin.
pub type InputReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Upstream stage whose records reach the index stage first.
const INDEX_UPSTREAM: &str = "shunt";

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Consumer over the configured input.
    pub consumer: JsonLinesConsumer<InputReader>,
    /// Status events of every processed record.
    pub status_rx: mpsc::UnboundedReceiver<StatusEvent>,
}

impl Dependencies {
    /// Initialize all dependencies from settings.
    ///
    /// Every sink replica gets its own index client and must pass its
    /// connectivity check. Replicas already prepared when one fails are
    /// cleaned up before the error is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the index is unreachable or the input cannot be opened
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            backend = %settings.endpoint.backend,
            index_url = %settings.endpoint.url,
            index_name = %settings.endpoint.index_name,
            parallelism = settings.parallelism,
            "Initializing dependencies"
        );

        let topology = crawl_topology(settings.parallelism)?;
        let grouping = topology
            .stage(INDEX_STAGE)
            .and_then(|stage| stage.input(INDEX_UPSTREAM, DEFAULT_STREAM))
            .map(|subscription| subscription.grouping.clone())
            .ok_or_else(|| IndexingError::config("crawl topology has no index stage input"))?;
        let router = Router::new(grouping, settings.parallelism)?;

        let (collector, collector_rx) = ChannelCollector::channel();
        let collector = Arc::new(collector);

        let clients = (0..settings.parallelism)
            .map(|_| connect(&settings.endpoint))
            .collect::<Result<Vec<_>, _>>()?;
        let sinks = prepare_replicas(clients, settings.sink.clone(), collector).await?;

        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let orchestrator =
            Orchestrator::new(sinks, collector_rx, router)?.with_status_channel(status_tx);

        let consumer = Self::open_input(settings).await?;

        Ok(Self {
            orchestrator,
            consumer,
            status_rx,
        })
    }

    async fn open_input(settings: &Settings) -> Result<JsonLinesConsumer<InputReader>, IndexingError> {
        match &settings.input {
            Some(path) => {
                let file = tokio::fs::File::open(path).await.map_err(|e| {
                    IndexingError::config(format!("Failed to open {}: {}", path.display(), e))
                })?;
                info!(path = %path.display(), "Reading records from file");
                let reader: InputReader = Box::new(BufReader::new(file));
                Ok(JsonLinesConsumer::new(reader, path.display().to_string()))
            }
            None => {
                info!("Reading records from stdin");
                let reader: InputReader = Box::new(BufReader::new(io::stdin()));
                Ok(JsonLinesConsumer::new(reader, "stdin"))
            }
        }
    }
}
