//! Orchestrator module for the crawl indexer pipeline.
//!
//! Coordinates the consumer and the indexing sink replicas.

use tokio::io::AsyncBufRead;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::collector::{AckToken, CollectorMessage, DeliveryId, STATUS_STREAM};
use crate::consumer::{JsonLinesConsumer, StreamMessage};
use crate::errors::PipelineError;
use crate::sink::IndexingSink;
use crate::topology::Router;
use crawl_indexer_shared::{Record, Status, StatusEvent};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the consumer channel and of every replica's inbox.
    pub channel_buffer_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
        }
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records routed to a sink replica.
    pub received: u64,
    pub acked: u64,
    pub failed: u64,
    /// `FETCHED` status events.
    pub fetched: u64,
    /// `ERROR` status events.
    pub errors: u64,
    /// Upstream lines that never became a record.
    pub rejected_lines: u64,
}

impl RunSummary {
    /// Records with neither an ack nor a fail.
    pub fn unresolved(&self) -> u64 {
        self.received.saturating_sub(self.acked + self.failed)
    }
}

/// Orchestrator that runs the sink replicas of the index stage.
///
/// The orchestrator:
/// - Assigns a delivery id to every record and routes it to one replica
/// - Runs each replica on its own task, so replicas never share a batch
/// - Tracks acknowledgments and status events from the collector channel
/// - Handles shutdown signals and runs every replica's cleanup
pub struct Orchestrator {
    sinks: Vec<IndexingSink>,
    collector_rx: mpsc::UnboundedReceiver<CollectorMessage>,
    router: Router,
    config: OrchestratorConfig,
    status_tx: Option<mpsc::UnboundedSender<StatusEvent>>,
    shutdown_tx: broadcast::Sender<()>,
    next_delivery: u64,
}

impl Orchestrator {
    /// Create an orchestrator over prepared sinks.
    ///
    /// # Arguments
    ///
    /// * `sinks` - One prepared sink per replica
    /// * `collector_rx` - Receiving end of the channel the sinks report to
    /// * `router` - Replica selection; must route over exactly `sinks.len()` replicas
    pub fn new(
        sinks: Vec<IndexingSink>,
        collector_rx: mpsc::UnboundedReceiver<CollectorMessage>,
        router: Router,
    ) -> Result<Self, PipelineError> {
        if sinks.is_empty() {
            return Err(PipelineError::config("orchestrator needs at least one sink"));
        }
        if sinks.len() != router.replicas() {
            return Err(PipelineError::config(format!(
                "router expects {} replicas but {} sinks were given",
                router.replicas(),
                sinks.len()
            )));
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            sinks,
            collector_rx,
            router,
            config: OrchestratorConfig::default(),
            status_tx: None,
            shutdown_tx,
            next_delivery: 0,
        })
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Forward every status event to `tx`.
    pub fn with_status_channel(mut self, tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// Handle that stops a running orchestrator when sent to.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until the consumer ends or a shutdown is requested.
    ///
    /// Pending documents of every replica get a final flush before this returns.
    #[instrument(skip(self, consumer), fields(replicas = self.sinks.len()))]
    pub async fn run<R>(mut self, consumer: JsonLinesConsumer<R>) -> Result<RunSummary, PipelineError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        info!("Starting crawl indexer orchestrator");

        let mut summary = RunSummary::default();
        let (tx, mut rx) = mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let consumer_shutdown = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(tx, consumer_shutdown).await {
                error!(error = %e, "Consumer error");
            }
        });

        let (replica_txs, replica_handles) = self.spawn_replicas();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut outcome = Ok(());

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(StreamMessage::Record(record)) => {
                            if let Err(e) = self.dispatch(record, &replica_txs).await {
                                error!(error = %e, "Failed to dispatch record");
                                outcome = Err(e);
                                break;
                            }
                            summary.received += 1;
                        }
                        Some(StreamMessage::Error(e)) => {
                            warn!(error = %e, "Received error from consumer");
                            summary.rejected_lines += 1;
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                    }
                }
                Some(message) = self.collector_rx.recv() => {
                    self.track(message, &mut summary);
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        let _ = self.shutdown_tx.send(());
        drop(rx);

        // Closing the inboxes ends every replica loop; each replica then runs its cleanup.
        drop(replica_txs);
        for (replica, handle) in replica_handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(replica = replica, error = %e, "Sink replica task failed");
            }
        }

        while let Ok(message) = self.collector_rx.try_recv() {
            self.track(message, &mut summary);
        }

        let _ = consumer_handle.await;

        info!(
            received = summary.received,
            acked = summary.acked,
            failed = summary.failed,
            fetched = summary.fetched,
            errors = summary.errors,
            rejected_lines = summary.rejected_lines,
            "Orchestrator shutdown complete"
        );

        outcome.map(|_| summary)
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn spawn_replicas(&mut self) -> (Vec<mpsc::Sender<(Record, AckToken)>>, Vec<JoinHandle<()>>) {
        let mut senders = Vec::with_capacity(self.sinks.len());
        let mut handles = Vec::with_capacity(self.sinks.len());

        for (replica, mut sink) in self.sinks.drain(..).enumerate() {
            let (tx, mut rx) = mpsc::channel::<(Record, AckToken)>(self.config.channel_buffer_size);
            senders.push(tx);
            handles.push(tokio::spawn(async move {
                debug!(replica = replica, "Sink replica started");
                while let Some((record, token)) = rx.recv().await {
                    sink.execute(record, token).await;
                }
                sink.cleanup().await;
                debug!(replica = replica, "Sink replica stopped");
            }));
        }

        (senders, handles)
    }

    async fn dispatch(
        &mut self,
        record: Record,
        replicas: &[mpsc::Sender<(Record, AckToken)>],
    ) -> Result<(), PipelineError> {
        self.next_delivery += 1;
        let token = AckToken::for_record(DeliveryId::new(self.next_delivery), &record);
        let replica = self.router.route(&record);

        replicas[replica]
            .send((record, token))
            .await
            .map_err(|e| PipelineError::channel(format!("replica {} stopped: {}", replica, e)))
    }

    fn track(&self, message: CollectorMessage, summary: &mut RunSummary) {
        match message {
            CollectorMessage::Emit { stream, anchor, event } => {
                if stream != STATUS_STREAM {
                    debug!(stream = %stream, delivery = %anchor, "Ignoring event on unknown stream");
                    return;
                }
                match event.status {
                    Status::Fetched => summary.fetched += 1,
                    Status::Error => summary.errors += 1,
                    _ => {}
                }
                if let Some(tx) = &self.status_tx {
                    if tx.send(event).is_err() {
                        warn!(delivery = %anchor, "Status receiver dropped");
                    }
                }
            }
            CollectorMessage::Ack(token) => {
                debug!(delivery = %token.id(), url = %token.url(), "Record acknowledged");
                summary.acked += 1;
            }
            CollectorMessage::Fail(token) => {
                warn!(delivery = %token.id(), url = %token.url(), "Record failed");
                summary.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::collector::ChannelCollector;
    use crate::sink::SinkConfig;
    use crate::test_support::MockIndexClient;
    use crate::topology::Grouping;

    async fn orchestrator(
        clients: &[Arc<MockIndexClient>],
        commit_size: usize,
    ) -> Orchestrator {
        let (collector, collector_rx) = ChannelCollector::channel();
        let collector = Arc::new(collector);
        let mut sinks = Vec::new();
        for client in clients {
            let sink = IndexingSink::prepare(
                client.clone(),
                SinkConfig::with_commit_size(commit_size),
                collector.clone(),
            )
            .await
            .unwrap();
            sinks.push(sink);
        }
        let router = Router::new(Grouping::Shuffle, clients.len()).unwrap();
        Orchestrator::new(sinks, collector_rx, router).unwrap()
    }

    #[tokio::test]
    async fn test_run_indexes_all_records_and_flushes_on_end() {
        let client = Arc::new(MockIndexClient::new());
        let orchestrator = orchestrator(&[client.clone()], 2).await;
        let input: &'static [u8] = b"{\"url\":\"u1\",\"content\":\"a\"}\n\
            {\"url\":\"u2\",\"content\":\"b\"}\n\
            {\"url\":\"u3\",\"content\":\"c\"}\n\
            {\"url\":\"u4\"}\n\
            garbage\n";

        let summary = orchestrator
            .run(JsonLinesConsumer::new(input, "test"))
            .await
            .unwrap();

        assert_eq!(summary.received, 4);
        assert_eq!(summary.acked, 4);
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.rejected_lines, 1);
        assert_eq!(summary.unresolved(), 0);
        assert_eq!(
            client.add_calls(),
            vec![
                vec!["u1".to_string(), "u2".to_string()],
                vec!["u3".to_string()]
            ]
        );
        assert_eq!(client.close_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replicas_keep_private_batches() {
        let first = Arc::new(MockIndexClient::new());
        let second = Arc::new(MockIndexClient::new());
        let orchestrator = orchestrator(&[first.clone(), second.clone()], 100).await;
        let input: &'static [u8] = b"{\"url\":\"u1\",\"content\":\"a\"}\n\
            {\"url\":\"u2\",\"content\":\"b\"}\n\
            {\"url\":\"u3\",\"content\":\"c\"}\n";

        orchestrator
            .run(JsonLinesConsumer::new(input, "test"))
            .await
            .unwrap();

        assert_eq!(first.add_calls(), vec![vec!["u1".to_string(), "u3".to_string()]]);
        assert_eq!(second.add_calls(), vec![vec!["u2".to_string()]]);
    }

    #[tokio::test]
    async fn test_status_events_are_forwarded() {
        let client = Arc::new(MockIndexClient::new());
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        let orchestrator = orchestrator(&[client], 10).await.with_status_channel(status_tx);
        let input: &'static [u8] = b"{\"url\":\"u1\",\"content\":\"a\"}\n";

        orchestrator
            .run(JsonLinesConsumer::new(input, "test"))
            .await
            .unwrap();

        let event = status_rx.recv().await.unwrap();
        assert_eq!(event.url, "u1");
        assert_eq!(event.status, Status::Fetched);
    }

    #[tokio::test]
    async fn test_router_and_sinks_must_agree() {
        let client = Arc::new(MockIndexClient::new());
        let (collector, collector_rx) = ChannelCollector::channel();
        let sink = IndexingSink::prepare(client, SinkConfig::default(), Arc::new(collector))
            .await
            .unwrap();
        let router = Router::new(Grouping::Shuffle, 2).unwrap();

        assert!(Orchestrator::new(vec![sink], collector_rx, router).is_err());
    }
}
