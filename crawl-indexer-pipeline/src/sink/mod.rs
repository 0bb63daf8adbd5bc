//! Indexing sink for the crawl indexer pipeline.
//!
//! Receives one record at a time, builds its index document, batches it and
//! commits batches to the remote index.
//!
//! ## Event contract
//!
//! | Input | Batch | Status event | Ack |
//! |---|---|---|---|
//! | empty or absent content | unchanged | none | `ack` |
//! | document built and enqueued | +1 | `FETCHED` | `ack` |
//! | decode failure or invalid record | unchanged | `ERROR` | `fail` |
//! | batch full and the flush before enqueue fails | unchanged | `ERROR` | `fail` |
//!
//! A failed commit does not change the outcome of the record that triggered
//! it: the record was already accepted into the batch, and the batch is
//! resubmitted on the next flush. Documents are therefore delivered to the
//! index at least once, eventually. Under `RejectNew`, a record arriving at a
//! full batch first flushes it; the record is only rejected if that flush
//! fails too.
//!
//! ## Concurrency
//!
//! `execute` takes `&mut self`, so one record (including any flush it
//! triggers) is fully processed before the next. A host that delivers to one
//! sink from several tasks must wrap it in a `tokio::sync::Mutex` so that
//! enqueue-and-maybe-flush stays atomic. Replicas never share state.

mod accumulator;
mod commit_controller;
mod config;

pub use accumulator::BatchAccumulator;
pub use commit_controller::{CommitController, FlushReport};
pub use config::{
    OverflowPolicy, SinkConfig, DEFAULT_COMMIT_SIZE, DEFAULT_MAX_DOCS_PER_BATCH,
    DEFAULT_MAX_PENDING_DOCS,
};

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::collector::{AckToken, OutputCollector, STATUS_STREAM};
use crate::errors::PipelineError;
use crate::processor::DocumentBuilder;
use crawl_indexer_repository::IndexClient;
use crawl_indexer_shared::{Record, Status, StatusEvent};

/// What happened to a flush triggered by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushAttempt {
    /// The commit size was not reached.
    NotNeeded,
    /// The batch was committed; carries the number of committed documents.
    Committed(usize),
    /// The flush failed and the batch was kept.
    Failed,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// No content: acknowledged without a document or a status event.
    Skipped,
    /// Document enqueued, `FETCHED` emitted, record acknowledged.
    Accepted { flush: FlushAttempt },
    /// Document could not be built or enqueued, `ERROR` emitted, record failed.
    Failed,
}

/// Terminal stage that writes crawled records into the search index.
pub struct IndexingSink {
    builder: DocumentBuilder,
    accumulator: BatchAccumulator,
    controller: CommitController,
    client: Arc<dyn IndexClient>,
    collector: Arc<dyn OutputCollector>,
}

impl IndexingSink {
    /// Verify the index is reachable and create a sink.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexingSink)` - Ready to receive records
    /// * `Err(PipelineError)` - The configuration is invalid or the index is unreachable;
    ///   the sink must not process records
    pub async fn prepare(
        client: Arc<dyn IndexClient>,
        config: SinkConfig,
        collector: Arc<dyn OutputCollector>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        info!(
            index = client.name(),
            commit_size = config.commit_size,
            max_docs_per_batch = config.max_docs_per_batch,
            max_pending_docs = config.max_pending_docs,
            overflow_policy = %config.overflow_policy,
            "Connecting indexing sink"
        );

        if let Err(e) = client.ping().await {
            error!(error = %e, index = client.name(), "Failed to connect to index");
            return Err(PipelineError::from(e));
        }

        info!(index = client.name(), "Successfully connected to index");

        Ok(Self {
            builder: DocumentBuilder::new(),
            accumulator: BatchAccumulator::new(config.max_pending_docs, config.overflow_policy),
            controller: CommitController::new(
                Arc::clone(&client),
                config.commit_size,
                config.max_docs_per_batch,
            ),
            client,
            collector,
        })
    }

    /// Process one delivered record.
    ///
    /// Calls exactly one of `ack` / `fail` on the collector for `token`, and
    /// emits at most one status event.
    #[instrument(skip(self, record, token), fields(url = %token.url(), delivery = %token.id()))]
    pub async fn execute(&mut self, record: Record, token: AckToken) -> SinkOutcome {
        if !record.has_content() {
            debug!("Empty content, acknowledging without indexing");
            self.collector.ack(&token);
            return SinkOutcome::Skipped;
        }

        let overflow_flush = match self.enqueue(&record, &token).await {
            Ok(flush) => flush,
            Err(e) => {
                error!(error = %e, "Failed to index document");
                self.emit_status(&token, Status::Error);
                self.collector.fail(&token);
                return SinkOutcome::Failed;
            }
        };

        let flush = if self.controller.should_flush(&self.accumulator) {
            match self.controller.flush(&mut self.accumulator).await {
                Ok(report) => FlushAttempt::Committed(report.submitted),
                Err(_) => FlushAttempt::Failed,
            }
        } else {
            overflow_flush.unwrap_or(FlushAttempt::NotNeeded)
        };

        self.emit_status(&token, Status::Fetched);
        self.collector.ack(&token);
        SinkOutcome::Accepted { flush }
    }

    /// Flush pending documents now, regardless of the commit size.
    pub async fn flush(&mut self) -> Result<FlushReport, PipelineError> {
        self.controller.flush(&mut self.accumulator).await
    }

    /// Terminal flush, then release the index connection.
    ///
    /// The connection is released even when the flush fails.
    pub async fn cleanup(mut self) {
        self.controller.terminal_flush(&mut self.accumulator).await;

        if let Err(e) = self.client.close().await {
            warn!(error = %e, index = self.client.name(), "Error closing index client");
        }

        info!(
            index = self.client.name(),
            committed = self.controller.total_committed(),
            "Indexing sink shut down"
        );
    }

    /// Number of documents waiting for a commit.
    pub fn pending(&self) -> usize {
        self.accumulator.size()
    }

    pub fn accumulator(&self) -> &BatchAccumulator {
        &self.accumulator
    }

    pub fn controller(&self) -> &CommitController {
        &self.controller
    }

    /// Build and enqueue the document for `record`.
    ///
    /// A full batch is flushed once and the enqueue retried, so a batch kept
    /// by earlier failed commits drains as soon as the index is back. Returns
    /// the outcome of that flush, if one was needed.
    async fn enqueue(
        &mut self,
        record: &Record,
        token: &AckToken,
    ) -> Result<Option<FlushAttempt>, PipelineError> {
        let document = self.builder.build(record)?;

        let mut flush = None;
        if self.accumulator.rejects_next() {
            let (pending, max) = (self.accumulator.size(), self.accumulator.max_pending());
            warn!(pending = pending, max = max, "Batch full, flushing before enqueue");
            let report = self
                .controller
                .flush(&mut self.accumulator)
                .await
                .map_err(|_| PipelineError::batch_full(pending, max))?;
            flush = Some(FlushAttempt::Committed(report.submitted));
        }

        self.accumulator.enqueue(document, token.clone())?;
        Ok(flush)
    }

    fn emit_status(&self, token: &AckToken, status: Status) {
        let event = StatusEvent::new(token.url(), Arc::clone(token.metadata()), status);
        self.collector.emit(STATUS_STREAM, token, event);
    }
}

/// Prepare one sink per client, in order.
///
/// If any client fails its connectivity check, the sinks prepared so far are
/// cleaned up before the error is returned.
pub async fn prepare_replicas(
    clients: Vec<Arc<dyn IndexClient>>,
    config: SinkConfig,
    collector: Arc<dyn OutputCollector>,
) -> Result<Vec<IndexingSink>, PipelineError> {
    let mut sinks: Vec<IndexingSink> = Vec::with_capacity(clients.len());
    for (replica, client) in clients.into_iter().enumerate() {
        match IndexingSink::prepare(client, config.clone(), Arc::clone(&collector)).await {
            Ok(sink) => {
                info!(replica = replica, "Index sink replica ready");
                sinks.push(sink);
            }
            Err(e) => {
                error!(replica = replica, error = %e, "Index sink replica failed to prepare");
                for sink in sinks {
                    sink.cleanup().await;
                }
                return Err(e);
            }
        }
    }
    Ok(sinks)
}
